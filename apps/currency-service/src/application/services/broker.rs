//! Rate Subscription Broker
//!
//! Runs the subscription protocol for each connection and fans rate updates
//! out to every subscriber when the rate table changes.
//!
//! # Connection lifecycle
//!
//! ```text
//! OPEN ──► receive request ──► validate ──► register ──┐
//!   ▲                                                   │
//!   └───────────────────────────────────────────────────┘
//!   │
//!   └─ end of stream / read error / outbound closed / shutdown ──► CLOSED
//! ```
//!
//! Rejected requests produce an in-band [`StreamMessage::SubscriptionError`];
//! the connection stays open. Accepted requests get no reply; the first
//! [`StreamMessage::RateUpdate`] for the pair is the confirmation.
//!
//! # Broadcast
//!
//! One loop per process consumes [`RatesChanged`] notifications. Each cycle
//! reads one rate table, snapshots the registry and delivers with
//! `try_send`, so a stalled subscriber only loses its own updates.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BrokerMetrics, NoopBrokerMetrics, RateSource};
use crate::domain::currency::RawRateRequest;
use crate::domain::streaming::{StreamMessage, SubscriptionRejection};
use crate::domain::subscription::{
    AddOutcome, ConnectionId, RegistryError, RegistryStats, SubscriptionRegistry,
};

// =============================================================================
// Types
// =============================================================================

/// Outbound side of one subscription stream.
pub type SubscriberHandle = mpsc::Sender<StreamMessage>;

/// Shared broker handle.
pub type SharedRateBroker = Arc<RateBroker>;

/// Notification that the rate table was refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatesChanged {
    /// Monotonic refresh counter.
    pub sequence: u64,
}

/// Counters for one completed broadcast cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Subscribers in the registry snapshot.
    pub subscribers: usize,
    /// Updates queued on subscriber channels.
    pub delivered: usize,
    /// Updates dropped because a subscriber channel was full.
    pub dropped: usize,
    /// Subscribers whose channel was already closed.
    pub closed: usize,
    /// Pairs skipped because a currency was missing from the table.
    pub skipped_pairs: usize,
}

/// Result of a broadcast cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Updates were computed from a rate table.
    Completed(CycleReport),
    /// No rate table was available; nothing was sent.
    Skipped,
}

impl CycleOutcome {
    /// The report of a completed cycle.
    #[must_use]
    pub const fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate an identifier for a new connection.
///
/// Identifiers are never reused within a process.
#[must_use]
pub fn new_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Broker
// =============================================================================

/// Owns the subscription registry and pushes rate updates to subscribers.
pub struct RateBroker {
    registry: SubscriptionRegistry<SubscriberHandle>,
    source: Arc<dyn RateSource>,
    metrics: Arc<dyn BrokerMetrics>,
}

impl RateBroker {
    /// Create a broker over a rate source.
    #[must_use]
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            source,
            metrics: Arc::new(NoopBrokerMetrics),
        }
    }

    /// Report broker events to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn BrokerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The subscription registry.
    #[must_use]
    pub const fn registry(&self) -> &SubscriptionRegistry<SubscriberHandle> {
        &self.registry
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Run the subscription protocol for one connection until it closes.
    ///
    /// The registry entry for `connection` is removed before returning,
    /// whatever the reason for closing.
    pub async fn serve_connection<S, E>(
        &self,
        connection: ConnectionId,
        outbound: SubscriberHandle,
        mut inbound: S,
        shutdown: CancellationToken,
    ) where
        S: Stream<Item = Result<RawRateRequest, E>> + Unpin,
        E: Display,
    {
        tracing::debug!(connection_id = %connection, "Subscription stream opened");

        loop {
            let next = tokio::select! {
                next = inbound.next() => next,
                () = outbound.closed() => {
                    tracing::debug!(connection_id = %connection, "Outbound stream closed");
                    break;
                }
                () = shutdown.cancelled() => {
                    tracing::debug!(connection_id = %connection, "Shutdown, closing subscription stream");
                    break;
                }
            };

            match next {
                Some(Ok(request)) => {
                    if let Some(rejection) = self.handle_request(connection, &outbound, request) {
                        self.metrics.subscription_rejected(rejection.code);
                        let message = StreamMessage::SubscriptionError(rejection);
                        // A full buffer must not hold the connection open past shutdown.
                        let sent = tokio::select! {
                            sent = outbound.send(message) => sent.is_ok(),
                            () = shutdown.cancelled() => {
                                tracing::debug!(connection_id = %connection, "Shutdown while sending rejection");
                                false
                            }
                        };
                        if !sent {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %connection, error = %e, "Subscription stream read failed");
                    break;
                }
                None => {
                    tracing::debug!(connection_id = %connection, "Subscription stream ended by client");
                    break;
                }
            }
        }

        if self.registry.remove(connection) {
            tracing::info!(connection_id = %connection, "Subscriber removed");
        }
        self.publish_gauges();
    }

    /// Apply one subscription request.
    ///
    /// Returns the in-band rejection to send, or `None` when accepted.
    pub fn handle_request(
        &self,
        connection: ConnectionId,
        outbound: &SubscriberHandle,
        raw: RawRateRequest,
    ) -> Option<SubscriptionRejection> {
        let request = match raw.decode() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection,
                    base = raw.base,
                    destination = raw.destination,
                    error = %e,
                    "Rejected subscription with unsupported currency"
                );
                return Some(SubscriptionRejection::invalid(raw, &e));
            }
        };

        match self.registry.try_add(connection, outbound, request) {
            Ok(AddOutcome::Accepted) => {
                tracing::info!(connection_id = %connection, pair = %request, "Subscribed to rate");
                self.publish_gauges();
                None
            }
            Ok(AddOutcome::Duplicate(existing)) => {
                tracing::warn!(connection_id = %connection, pair = %existing, "Duplicate subscription");
                Some(SubscriptionRejection::duplicate(existing))
            }
            Err(RegistryError::SameCurrency(e)) => {
                tracing::warn!(connection_id = %connection, pair = %request, "Rejected same-currency subscription");
                Some(SubscriptionRejection::invalid(raw, &e))
            }
        }
    }

    /// Compute and deliver one round of rate updates.
    pub fn broadcast_cycle(&self) -> CycleOutcome {
        let table = match self.source.snapshot() {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping broadcast cycle");
                return CycleOutcome::Skipped;
            }
        };

        let subscribers = self.registry.snapshot();
        let mut report = CycleReport {
            subscribers: subscribers.len(),
            ..CycleReport::default()
        };

        for subscriber in subscribers {
            for pair in &subscriber.pairs {
                let quote = match table.quote(*pair) {
                    Ok(quote) => quote,
                    Err(e) => {
                        tracing::warn!(connection_id = %subscriber.connection, pair = %pair, error = %e, "Skipping pair");
                        report.skipped_pairs += 1;
                        continue;
                    }
                };

                match subscriber.handle.try_send(StreamMessage::RateUpdate(quote)) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(connection_id = %subscriber.connection, pair = %pair, "Subscriber buffer full, dropping update");
                        report.dropped += 1;
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(connection_id = %subscriber.connection, "Subscriber channel closed");
                        report.closed += 1;
                        break;
                    }
                }
            }
        }

        CycleOutcome::Completed(report)
    }

    /// Broadcast on every notification until shutdown or the notification
    /// channel closes.
    pub async fn run(
        &self,
        mut notifications: mpsc::Receiver<RatesChanged>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Rate broker started");

        loop {
            let changed = tokio::select! {
                changed = notifications.recv() => changed,
                () = shutdown.cancelled() => {
                    tracing::info!("Rate broker shutting down");
                    break;
                }
            };

            let Some(changed) = changed else {
                tracing::info!("Rate notifications closed, stopping broker");
                break;
            };

            let started = Instant::now();
            let outcome = self.broadcast_cycle();
            let elapsed = started.elapsed();

            match outcome {
                CycleOutcome::Completed(report) => {
                    tracing::debug!(
                        sequence = changed.sequence,
                        subscribers = report.subscribers,
                        delivered = report.delivered,
                        dropped = report.dropped,
                        skipped_pairs = report.skipped_pairs,
                        "Broadcast cycle completed"
                    );
                    self.metrics
                        .cycle_completed(report.delivered, report.dropped, elapsed);
                }
                CycleOutcome::Skipped => self.metrics.cycle_skipped(elapsed),
            }
        }
    }

    fn publish_gauges(&self) {
        self.metrics.subscriptions_changed(self.registry.stats());
    }
}

impl std::fmt::Debug for RateBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateBroker")
            .field("registry", &self.registry.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use parking_lot::RwLock;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;
    use crate::application::ports::{MockBrokerMetrics, MockRateSource};
    use crate::domain::currency::{Currency, RateRequest};
    use crate::domain::rates::{RateError, RateTable};
    use crate::domain::streaming::RejectionCode;

    struct SwappableSource {
        table: RwLock<Option<Arc<RateTable>>>,
    }

    impl SwappableSource {
        fn with(table: RateTable) -> Arc<Self> {
            Arc::new(Self {
                table: RwLock::new(Some(Arc::new(table))),
            })
        }
    }

    impl RateSource for SwappableSource {
        fn snapshot(&self) -> Result<Arc<RateTable>, RateError> {
            self.table.read().clone().ok_or(RateError::Unavailable)
        }
    }

    fn sample_table() -> RateTable {
        RateTable::from_values([
            (Currency::Usd, 1.10),
            (Currency::Gbp, 0.85),
            (Currency::Jpy, 160.0),
        ])
    }

    fn broker() -> RateBroker {
        RateBroker::new(SwappableSource::with(sample_table()))
    }

    fn raw(base: Currency, destination: Currency) -> RawRateRequest {
        RateRequest::new(base, destination).into()
    }

    fn drain(rx: &mut mpsc::Receiver<StreamMessage>) -> Vec<StreamMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn accepted_request_has_no_reply() {
        let broker = broker();
        let (tx, _rx) = mpsc::channel(8);

        let reply = broker.handle_request(1, &tx, raw(Currency::Eur, Currency::Usd));

        assert!(reply.is_none());
        assert_eq!(broker.registry().pairs(1).len(), 1);
    }

    #[test]
    fn duplicate_request_is_rejected_in_band() {
        let broker = broker();
        let (tx, _rx) = mpsc::channel(8);
        let request = raw(Currency::Eur, Currency::Usd);

        broker.handle_request(1, &tx, request);
        let reply = broker.handle_request(1, &tx, request).unwrap();

        assert_eq!(reply.code, RejectionCode::AlreadyExists);
        assert_eq!(reply.request, request);
        assert_eq!(broker.stats().subscription_count, 1);
    }

    #[test]
    fn same_currency_request_is_invalid() {
        let broker = broker();
        let (tx, _rx) = mpsc::channel(8);
        let request = raw(Currency::Usd, Currency::Usd);

        let reply = broker.handle_request(1, &tx, request).unwrap();

        assert_eq!(reply.code, RejectionCode::InvalidArgument);
        assert_eq!(reply.request, request);
        assert_eq!(broker.stats().connection_count, 0);
    }

    #[test]
    fn unsupported_code_is_invalid() {
        let broker = broker();
        let (tx, _rx) = mpsc::channel(8);
        let request = RawRateRequest::new(0, 57);

        let reply = broker.handle_request(1, &tx, request).unwrap();

        assert_eq!(reply.code, RejectionCode::InvalidArgument);
        assert_eq!(reply.request, request);
        assert!(!broker.registry().contains(1));
    }

    #[test]
    fn each_connection_receives_only_its_pairs() {
        let broker = broker();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        broker.handle_request(1, &tx_a, raw(Currency::Eur, Currency::Usd));
        broker.handle_request(2, &tx_b, raw(Currency::Eur, Currency::Gbp));

        let outcome = broker.broadcast_cycle();

        assert_eq!(outcome.report().map(|r| r.delivered), Some(2));
        let a = drain(&mut rx_a);
        let b = drain(&mut rx_b);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        let quote_a = a[0].as_rate_update().unwrap();
        let quote_b = b[0].as_rate_update().unwrap();
        assert_eq!((quote_a.base, quote_a.destination), (Currency::Eur, Currency::Usd));
        assert_eq!((quote_b.base, quote_b.destination), (Currency::Eur, Currency::Gbp));
        assert_eq!(quote_a.rate, 1.0 / 1.10);
    }

    #[test]
    fn n_notifications_k_pairs() {
        let broker = broker();
        let (tx, mut rx) = mpsc::channel(64);
        let pairs = [
            raw(Currency::Eur, Currency::Usd),
            raw(Currency::Usd, Currency::Gbp),
            raw(Currency::Jpy, Currency::Eur),
        ];
        for pair in pairs {
            assert!(broker.handle_request(9, &tx, pair).is_none());
        }

        for _ in 0..5 {
            broker.broadcast_cycle();
        }

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 15);
        assert!(messages.iter().all(|m| m.as_rate_update().is_some()));
    }

    #[test]
    fn closed_subscriber_does_not_affect_others() {
        let broker = broker();
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        broker.handle_request(1, &tx_a, raw(Currency::Eur, Currency::Usd));
        broker.handle_request(1, &tx_a, raw(Currency::Eur, Currency::Jpy));
        broker.handle_request(2, &tx_b, raw(Currency::Eur, Currency::Gbp));
        drop(rx_a);

        let report = *broker.broadcast_cycle().report().unwrap();

        assert_eq!(report.closed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
        // Removal is the receive loop's job.
        assert!(broker.registry().contains(1));
    }

    #[test]
    fn full_buffer_drops_update() {
        let broker = broker();
        let (tx, mut rx) = mpsc::channel(1);
        broker.handle_request(1, &tx, raw(Currency::Eur, Currency::Usd));

        broker.broadcast_cycle();
        let report = *broker.broadcast_cycle().report().unwrap();

        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn missing_currency_skips_pair() {
        let broker = broker();
        let (tx, mut rx) = mpsc::channel(8);
        broker.handle_request(1, &tx, raw(Currency::Rub, Currency::Usd));
        broker.handle_request(1, &tx, raw(Currency::Gbp, Currency::Usd));

        let report = *broker.broadcast_cycle().report().unwrap();

        assert_eq!(report.skipped_pairs, 1);
        assert_eq!(report.delivered, 1);
        let messages = drain(&mut rx);
        assert_eq!(messages[0].as_rate_update().unwrap().base, Currency::Gbp);
    }

    #[test]
    fn unavailable_table_skips_cycle() {
        let mut source = MockRateSource::new();
        source
            .expect_snapshot()
            .returning(|| Err(RateError::Unavailable));
        let broker = RateBroker::new(Arc::new(source));
        let (tx, mut rx) = mpsc::channel(8);
        broker.handle_request(1, &tx, raw(Currency::Eur, Currency::Usd));

        assert_eq!(broker.broadcast_cycle(), CycleOutcome::Skipped);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn cycle_uses_single_table_snapshot() {
        let mut source = MockRateSource::new();
        let table = Arc::new(sample_table());
        source
            .expect_snapshot()
            .times(1)
            .returning(move || Ok(Arc::clone(&table)));
        let broker = RateBroker::new(Arc::new(source));
        let (tx, _rx) = mpsc::channel(16);
        for (connection, dest) in [(1, Currency::Usd), (2, Currency::Gbp), (3, Currency::Jpy)] {
            broker.handle_request(connection, &tx, raw(Currency::Eur, dest));
        }

        let report = *broker.broadcast_cycle().report().unwrap();
        assert_eq!(report.subscribers, 3);
    }

    #[test]
    fn connection_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..1000).map(|_| new_connection_id()).collect::<Vec<_>>()))
            .collect();

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "connection id {id} allocated twice");
            }
        }
        assert_eq!(ids.len(), 4000);
    }

    async fn wait_for(broker: &RateBroker, connections: usize, subscriptions: usize) {
        for _ in 0..200 {
            let stats = broker.stats();
            if stats.connection_count == connections && stats.subscription_count == subscriptions {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {connections} connections / {subscriptions} subscriptions");
    }

    #[tokio::test]
    async fn serve_connection_replies_and_cleans_up() {
        let broker = Arc::new(broker());
        let (in_tx, in_rx) = mpsc::channel::<Result<RawRateRequest, Infallible>>(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let task = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .serve_connection(7, out_tx, ReceiverStream::new(in_rx), CancellationToken::new())
                    .await;
            })
        };

        let request = raw(Currency::Eur, Currency::Usd);
        in_tx.send(Ok(request)).await.unwrap();
        in_tx.send(Ok(request)).await.unwrap();

        let reply = out_rx.recv().await.unwrap();
        let rejection = reply.as_rejection().unwrap();
        assert_eq!(rejection.code, RejectionCode::AlreadyExists);
        assert_eq!(rejection.request, request);
        wait_for(&broker, 1, 1).await;

        broker.broadcast_cycle();
        let update = out_rx.recv().await.unwrap();
        assert!(update.as_rate_update().is_some());

        drop(in_tx);
        task.await.unwrap();
        assert_eq!(broker.stats(), RegistryStats::default());
    }

    #[tokio::test]
    async fn serve_connection_exits_when_outbound_dropped() {
        let broker = Arc::new(broker());
        let (in_tx, in_rx) = mpsc::channel::<Result<RawRateRequest, Infallible>>(8);
        let (out_tx, out_rx) = mpsc::channel(8);

        let task = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .serve_connection(3, out_tx, ReceiverStream::new(in_rx), CancellationToken::new())
                    .await;
            })
        };

        in_tx.send(Ok(raw(Currency::Usd, Currency::Jpy))).await.unwrap();
        wait_for(&broker, 1, 1).await;

        drop(out_rx);
        task.await.unwrap();
        assert!(!broker.registry().contains(3));
    }

    #[tokio::test]
    async fn serve_connection_exits_on_read_error() {
        let broker = Arc::new(broker());
        let (out_tx, _out_rx) = mpsc::channel(8);
        let inbound = tokio_stream::iter(vec![
            Ok(raw(Currency::Usd, Currency::Jpy)),
            Err("transport reset"),
            Ok(raw(Currency::Usd, Currency::Gbp)),
        ]);

        broker
            .serve_connection(4, out_tx, inbound, CancellationToken::new())
            .await;

        assert_eq!(broker.stats(), RegistryStats::default());
    }

    #[tokio::test]
    async fn serve_connection_exits_on_shutdown() {
        let broker = Arc::new(broker());
        let (in_tx, in_rx) = mpsc::channel::<Result<RawRateRequest, Infallible>>(8);
        let (out_tx, _out_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = {
            let broker = Arc::clone(&broker);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                broker
                    .serve_connection(5, out_tx, ReceiverStream::new(in_rx), shutdown)
                    .await;
            })
        };

        in_tx.send(Ok(raw(Currency::Eur, Currency::Chf))).await.unwrap();
        wait_for(&broker, 1, 1).await;

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(broker.stats().connection_count, 0);
    }

    #[tokio::test]
    async fn shutdown_interrupts_blocked_rejection() {
        let broker = Arc::new(broker());
        let (in_tx, in_rx) = mpsc::channel::<Result<RawRateRequest, Infallible>>(8);
        let (out_tx, _out_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();

        let task = {
            let broker = Arc::clone(&broker);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                broker
                    .serve_connection(6, out_tx, ReceiverStream::new(in_rx), shutdown)
                    .await;
            })
        };

        let request = raw(Currency::Eur, Currency::Usd);
        in_tx.send(Ok(request)).await.unwrap();
        wait_for(&broker, 1, 1).await;

        // Fill the one-slot buffer, then queue a rejection behind it.
        assert_eq!(broker.broadcast_cycle().report().unwrap().delivered, 1);
        in_tx.send(Ok(request)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("receive loop ignored shutdown")
            .unwrap();
        assert!(!broker.registry().contains(6));
    }

    #[tokio::test]
    async fn broker_events_reach_metrics() {
        let mut metrics = MockBrokerMetrics::new();
        metrics
            .expect_subscriptions_changed()
            .withf(|stats| stats.subscription_count <= 1)
            .times(2)
            .return_const(());
        metrics
            .expect_subscription_rejected()
            .withf(|code| *code == RejectionCode::AlreadyExists)
            .times(1)
            .return_const(());

        let broker = Arc::new(broker().with_metrics(Arc::new(metrics)));
        let (in_tx, in_rx) = mpsc::channel::<Result<RawRateRequest, Infallible>>(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let task = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .serve_connection(8, out_tx, ReceiverStream::new(in_rx), CancellationToken::new())
                    .await;
            })
        };

        let request = raw(Currency::Usd, Currency::Gbp);
        in_tx.send(Ok(request)).await.unwrap();
        in_tx.send(Ok(request)).await.unwrap();
        assert!(out_rx.recv().await.unwrap().as_rejection().is_some());

        drop(in_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn run_reports_cycles_to_metrics() {
        let mut metrics = MockBrokerMetrics::new();
        metrics
            .expect_cycle_completed()
            .withf(|delivered, dropped, _| *delivered == 0 && *dropped == 0)
            .times(1)
            .return_const(());
        metrics.expect_cycle_skipped().times(1).return_const(());

        let source = Arc::new(SwappableSource {
            table: RwLock::new(None),
        });
        let broker = RateBroker::new(source.clone()).with_metrics(Arc::new(metrics));
        let (tx, rx) = mpsc::channel(4);

        tx.send(RatesChanged { sequence: 1 }).await.unwrap();
        drop(tx);
        broker.run(rx, CancellationToken::new()).await;

        *source.table.write() = Some(Arc::new(sample_table()));
        let (tx, rx) = mpsc::channel(4);
        tx.send(RatesChanged { sequence: 2 }).await.unwrap();
        drop(tx);
        broker.run(rx, CancellationToken::new()).await;
    }

    #[tokio::test]
    async fn run_broadcasts_per_notification() {
        let broker = Arc::new(broker());
        let (out_tx, mut out_rx) = mpsc::channel(16);
        broker.handle_request(1, &out_tx, raw(Currency::Eur, Currency::Usd));
        broker.handle_request(1, &out_tx, raw(Currency::Gbp, Currency::Usd));

        let (notify_tx, notify_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let task = {
            let broker = Arc::clone(&broker);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { broker.run(notify_rx, shutdown).await })
        };

        for sequence in 1..=3 {
            notify_tx.send(RatesChanged { sequence }).await.unwrap();
        }

        let mut received = 0;
        while received < 6 {
            let message = tokio::time::timeout(Duration::from_secs(2), out_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(message.as_rate_update().is_some());
            received += 1;
        }

        drop(notify_tx);
        task.await.unwrap();
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let broker = Arc::new(broker());
        let (_notify_tx, notify_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), broker.run(notify_rx, shutdown))
            .await
            .unwrap();
    }
}
