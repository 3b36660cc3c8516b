//! Rate Streaming Messages
//!
//! Messages pushed from the broker to a subscribed connection. Protocol
//! errors are ordinary payloads on the stream so the connection stays open.

use super::currency::{CurrencyError, RawRateRequest, RateRequest};
use super::rates::RateQuote;

/// A message delivered on a subscription stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A pushed rate for one subscribed pair.
    RateUpdate(RateQuote),
    /// A subscription request was rejected.
    SubscriptionError(SubscriptionRejection),
}

impl StreamMessage {
    /// The rate update, if this is one.
    #[must_use]
    pub const fn as_rate_update(&self) -> Option<&RateQuote> {
        match self {
            Self::RateUpdate(quote) => Some(quote),
            Self::SubscriptionError(_) => None,
        }
    }

    /// The rejection, if this is one.
    #[must_use]
    pub const fn as_rejection(&self) -> Option<&SubscriptionRejection> {
        match self {
            Self::RateUpdate(_) => None,
            Self::SubscriptionError(rejection) => Some(rejection),
        }
    }
}

/// Why a subscription request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionCode {
    /// The connection is already subscribed to this pair.
    AlreadyExists,
    /// Unsupported currency code or base equal to destination.
    InvalidArgument,
}

impl RejectionCode {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::InvalidArgument => "invalid_argument",
        }
    }
}

/// In-band error echoing the offending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRejection {
    /// Rejection category.
    pub code: RejectionCode,
    /// Human readable reason.
    pub message: String,
    /// The request exactly as received.
    pub request: RawRateRequest,
}

impl SubscriptionRejection {
    /// Rejection for a pair the connection already holds.
    #[must_use]
    pub fn duplicate(request: RateRequest) -> Self {
        Self {
            code: RejectionCode::AlreadyExists,
            message: format!("subscription already active for rate {request}"),
            request: request.into(),
        }
    }

    /// Rejection for a malformed request.
    #[must_use]
    pub fn invalid(request: RawRateRequest, error: &CurrencyError) -> Self {
        Self {
            code: RejectionCode::InvalidArgument,
            message: error.to_string(),
            request,
        }
    }
}
