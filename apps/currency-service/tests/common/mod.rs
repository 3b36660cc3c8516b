//! Shared harness for gRPC integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::Streaming;
use tonic::transport::{Channel, Server};

use currency_service::proto::{
    Currencies, RateRequest, StreamingRateResponse, currency_client::CurrencyClient,
    streaming_rate_response,
};
use currency_service::{
    CurrencyGrpcServer, CurrencyGrpcServerConfig, RateBroker, RateService, RateStore,
    SharedRateBroker, SharedRateStore,
};

/// A running server and handles to drive it.
pub struct TestService {
    pub addr: String,
    pub store: SharedRateStore,
    pub broker: SharedRateBroker,
    pub shutdown: CancellationToken,
}

impl TestService {
    /// Start a server on a random port over `store`.
    pub async fn start(store: RateStore) -> Self {
        Self::start_with_buffer(store, 256).await
    }

    /// Start a server with a specific per-stream outbound buffer.
    pub async fn start_with_buffer(store: RateStore, subscriber_buffer: usize) -> Self {
        let store = Arc::new(store);
        let broker = Arc::new(RateBroker::new(store.clone()));
        let rates = RateService::new(store.clone());
        let shutdown = CancellationToken::new();

        let server = CurrencyGrpcServer::new(
            CurrencyGrpcServerConfig { subscriber_buffer },
            rates,
            Arc::clone(&broker),
            shutdown.clone(),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_shutdown = shutdown.clone();

        tokio::spawn(async move {
            Server::builder()
                .add_service(server.into_service())
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    server_shutdown.cancelled_owned(),
                )
                .await
                .unwrap();
        });

        Self {
            addr: format!("http://{addr}"),
            store,
            broker,
            shutdown,
        }
    }

    /// Connect a new client.
    pub async fn client(&self) -> CurrencyClient<Channel> {
        CurrencyClient::connect(self.addr.clone()).await.unwrap()
    }

    /// Open a subscription stream.
    pub async fn subscribe(&self) -> Subscription {
        let mut client = self.client().await;
        let (tx, rx) = mpsc::channel(64);
        let responses = client
            .subscribe_rates(ReceiverStream::new(rx))
            .await
            .unwrap()
            .into_inner();
        Subscription { requests: tx, responses }
    }

    /// Poll until the broker holds exactly `expected` subscriptions.
    pub async fn wait_for_subscriptions(&self, expected: usize) {
        timeout(Duration::from_secs(5), async {
            while self.broker.stats().subscription_count != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {expected} subscriptions, broker has {:?}",
                self.broker.stats()
            )
        });
    }

    /// Poll until the broker holds exactly `expected` connections.
    pub async fn wait_for_connections(&self, expected: usize) {
        timeout(Duration::from_secs(5), async {
            while self.broker.stats().connection_count != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {expected} connections, broker has {:?}",
                self.broker.stats()
            )
        });
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Client side of one subscription stream.
pub struct Subscription {
    pub requests: mpsc::Sender<RateRequest>,
    pub responses: Streaming<StreamingRateResponse>,
}

impl Subscription {
    /// Send one subscription request.
    pub async fn request(&self, base: Currencies, destination: Currencies) {
        self.requests
            .send(pair(base, destination))
            .await
            .unwrap();
    }

    /// Next message on the stream, failing after two seconds.
    pub async fn next(&mut self) -> streaming_rate_response::Message {
        timeout(Duration::from_secs(2), self.responses.next())
            .await
            .expect("timed out waiting for a stream message")
            .expect("stream ended")
            .expect("stream failed")
            .message
            .expect("empty stream message")
    }

    /// Assert nothing arrives within `wait`.
    pub async fn assert_quiet(&mut self, wait: Duration) {
        if let Ok(Some(message)) = timeout(wait, self.responses.next()).await {
            panic!("unexpected stream message {message:?}");
        }
    }
}

/// Build a wire request.
pub fn pair(base: Currencies, destination: Currencies) -> RateRequest {
    RateRequest {
        base: base as i32,
        destination: destination as i32,
    }
}
