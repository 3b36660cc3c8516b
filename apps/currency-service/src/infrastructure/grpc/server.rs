//! gRPC Currency Server Implementation
//!
//! Bridges the generated `Currency` service to the rate service and the
//! subscription broker, and converts between wire and domain types.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Request, Response, Status, Streaming};
use tonic_types::{ErrorDetails, StatusExt};

use super::proto::currency::v1::{
    self as proto, RateResponse, StreamingRateResponse, SubscriptionError,
    currency_server::{Currency as CurrencyApi, CurrencyServer},
    streaming_rate_response,
};
use crate::application::services::{
    RateLookupError, RateService, SharedRateBroker, new_connection_id,
};
use crate::domain::currency::RawRateRequest;
use crate::domain::rates::RateQuote;
use crate::domain::streaming::{RejectionCode, StreamMessage, SubscriptionRejection};
use crate::infrastructure::metrics;

// =============================================================================
// Type Aliases
// =============================================================================

type GrpcResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// `ErrorInfo` reason for a malformed rate request. The metadata carries
/// the request's raw `base` and `destination` codes.
pub const INVALID_REQUEST_REASON: &str = "INVALID_RATE_REQUEST";

/// `ErrorInfo` domain for errors raised by this service.
pub const ERROR_DOMAIN: &str = "currency.v1";

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC currency server.
#[derive(Debug, Clone)]
pub struct CurrencyGrpcServerConfig {
    /// Capacity of each subscription stream's outbound channel.
    pub subscriber_buffer: usize,
}

impl Default for CurrencyGrpcServerConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
        }
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC server for rate lookups and rate subscriptions.
#[derive(Debug, Clone)]
pub struct CurrencyGrpcServer {
    config: CurrencyGrpcServerConfig,
    rates: RateService,
    broker: SharedRateBroker,
    shutdown: CancellationToken,
}

impl CurrencyGrpcServer {
    /// Create a new gRPC currency server.
    ///
    /// Open subscription streams end when `shutdown` is cancelled.
    #[must_use]
    pub fn new(
        config: CurrencyGrpcServerConfig,
        rates: RateService,
        broker: SharedRateBroker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            rates,
            broker,
            shutdown,
        }
    }

    /// Wrap in the generated tonic service.
    #[must_use]
    pub fn into_service(self) -> CurrencyServer<Self> {
        CurrencyServer::new(self)
    }
}

#[tonic::async_trait]
impl CurrencyApi for CurrencyGrpcServer {
    type SubscribeRatesStream = BoxedStream<StreamingRateResponse>;

    async fn get_rate(&self, request: Request<proto::RateRequest>) -> GrpcResult<RateResponse> {
        let raw = RawRateRequest::from(request.into_inner());
        tracing::debug!(base = raw.base, destination = raw.destination, "Handle GetRate");

        match self.rates.get_rate(raw) {
            Ok(quote) => {
                metrics::record_rate_lookup("ok");
                Ok(Response::new(quote_to_proto(&quote)))
            }
            Err(e) => {
                metrics::record_rate_lookup(e.outcome());
                tracing::warn!(base = raw.base, destination = raw.destination, error = %e, "GetRate failed");
                Err(lookup_error_to_status(&e))
            }
        }
    }

    async fn subscribe_rates(
        &self,
        request: Request<Streaming<proto::RateRequest>>,
    ) -> GrpcResult<Self::SubscribeRatesStream> {
        let connection = new_connection_id();
        let inbound = request
            .into_inner()
            .map(|item| item.map(RawRateRequest::from));

        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        let broker = Arc::clone(&self.broker);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            broker
                .serve_connection(connection, tx, inbound, shutdown)
                .await;
        });

        let stream = ReceiverStream::new(rx).map(|message| Ok(message_to_proto(message)));
        Ok(Response::new(Box::pin(stream) as Self::SubscribeRatesStream))
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<proto::RateRequest> for RawRateRequest {
    fn from(request: proto::RateRequest) -> Self {
        Self::new(request.base, request.destination)
    }
}

impl From<RawRateRequest> for proto::RateRequest {
    fn from(request: RawRateRequest) -> Self {
        Self {
            base: request.base,
            destination: request.destination,
        }
    }
}

fn quote_to_proto(quote: &RateQuote) -> RateResponse {
    RateResponse {
        base: quote.base.code(),
        destination: quote.destination.code(),
        rate: quote.rate,
    }
}

const fn rejection_code_to_grpc(code: RejectionCode) -> Code {
    match code {
        RejectionCode::AlreadyExists => Code::AlreadyExists,
        RejectionCode::InvalidArgument => Code::InvalidArgument,
    }
}

fn rejection_to_proto(rejection: SubscriptionRejection) -> SubscriptionError {
    SubscriptionError {
        code: rejection_code_to_grpc(rejection.code) as i32,
        message: rejection.message,
        request: Some(rejection.request.into()),
    }
}

fn message_to_proto(message: StreamMessage) -> StreamingRateResponse {
    let message = match message {
        StreamMessage::RateUpdate(quote) => {
            streaming_rate_response::Message::RateResponse(quote_to_proto(&quote))
        }
        StreamMessage::SubscriptionError(rejection) => {
            streaming_rate_response::Message::Error(rejection_to_proto(rejection))
        }
    };
    StreamingRateResponse {
        message: Some(message),
    }
}

fn lookup_error_to_status(error: &RateLookupError) -> Status {
    match error {
        RateLookupError::InvalidArgument {
            request,
            field,
            source,
        } => {
            let mut details = ErrorDetails::with_bad_request_violation(*field, source.to_string());
            details.set_error_info(
                INVALID_REQUEST_REASON,
                ERROR_DOMAIN,
                HashMap::from([
                    ("base".to_string(), request.base.to_string()),
                    ("destination".to_string(), request.destination.to_string()),
                ]),
            );
            Status::with_error_details(Code::InvalidArgument, error.to_string(), details)
        }
        RateLookupError::Unavailable => Status::unavailable(error.to_string()),
        RateLookupError::NotFound(_) => Status::not_found(error.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
