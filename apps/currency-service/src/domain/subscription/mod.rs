//! Subscription Registry
//!
//! Tracks which currency pairs each live connection is subscribed to,
//! together with the connection's outbound handle.
//!
//! # Design
//!
//! The registry is shared between every connection's receive loop and the
//! broadcast loop:
//! - Only a connection's own receive loop adds or removes its entry
//! - The broadcast loop reads through [`SubscriptionRegistry::snapshot`] and
//!   sends without holding the lock
//! - Duplicate detection and insertion happen under a single write lock
//!
//! The handle type is generic so the registry stays free of runtime types.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::currency::{CurrencyError, RateRequest};

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a connection (one subscription stream).
pub type ConnectionId = u64;

/// Result of registering a pair for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The pair was added.
    Accepted,
    /// The connection already holds an equal pair; nothing changed.
    Duplicate(RateRequest),
}

/// Registry rejection that leaves the registry untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Base and destination are the same currency.
    #[error(transparent)]
    SameCurrency(#[from] CurrencyError),
}

/// A subscribed connection.
#[derive(Debug, Clone)]
struct Subscriber<H> {
    handle: H,
    pairs: Vec<RateRequest>,
}

/// Point-in-time copy of one subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberSnapshot<H> {
    /// Connection the pairs belong to.
    pub connection: ConnectionId,
    /// Outbound handle for the connection.
    pub handle: H,
    /// Subscribed pairs in subscription order.
    pub pairs: Vec<RateRequest>,
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe map of `connection -> (handle, pairs)`.
///
/// # Example
///
/// ```rust
/// use currency_service::domain::currency::{Currency, RateRequest};
/// use currency_service::domain::subscription::{AddOutcome, SubscriptionRegistry};
///
/// let registry = SubscriptionRegistry::new();
/// let pair = RateRequest::new(Currency::Eur, Currency::Usd);
///
/// assert_eq!(registry.try_add(1, &"conn-1", pair), Ok(AddOutcome::Accepted));
/// assert_eq!(registry.try_add(1, &"conn-1", pair), Ok(AddOutcome::Duplicate(pair)));
///
/// assert!(registry.remove(1));
/// assert_eq!(registry.subscription_count(), 0);
/// ```
#[derive(Debug)]
pub struct SubscriptionRegistry<H> {
    subscribers: RwLock<HashMap<ConnectionId, Subscriber<H>>>,
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> SubscriptionRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register `request` for `connection`.
    ///
    /// The entry is created on the first accepted pair; `handle` is stored
    /// only then.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SameCurrency`] when base equals destination.
    pub fn try_add(
        &self,
        connection: ConnectionId,
        handle: &H,
        request: RateRequest,
    ) -> Result<AddOutcome, RegistryError>
    where
        H: Clone,
    {
        request.ensure_distinct()?;

        let mut subscribers = self.subscribers.write();
        let subscriber = subscribers
            .entry(connection)
            .or_insert_with(|| Subscriber {
                handle: handle.clone(),
                pairs: Vec::new(),
            });

        if let Some(existing) = subscriber.pairs.iter().find(|p| **p == request) {
            return Ok(AddOutcome::Duplicate(*existing));
        }

        subscriber.pairs.push(request);
        Ok(AddOutcome::Accepted)
    }

    /// Remove a connection and all its pairs.
    ///
    /// Returns `true` if an entry existed.
    pub fn remove(&self, connection: ConnectionId) -> bool {
        self.subscribers.write().remove(&connection).is_some()
    }

    /// Copy every subscriber out of the registry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriberSnapshot<H>>
    where
        H: Clone,
    {
        self.subscribers
            .read()
            .iter()
            .map(|(connection, subscriber)| SubscriberSnapshot {
                connection: *connection,
                handle: subscriber.handle.clone(),
                pairs: subscriber.pairs.clone(),
            })
            .collect()
    }

    /// Pairs held by a connection, in subscription order.
    #[must_use]
    pub fn pairs(&self, connection: ConnectionId) -> Vec<RateRequest> {
        self.subscribers
            .read()
            .get(&connection)
            .map(|s| s.pairs.clone())
            .unwrap_or_default()
    }

    /// Whether a connection has an entry.
    #[must_use]
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.subscribers.read().contains_key(&connection)
    }

    /// Number of subscribed connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Total number of subscribed pairs across all connections.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().values().map(|s| s.pairs.len()).sum()
    }

    /// Get overall statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let subscribers = self.subscribers.read();
        RegistryStats {
            connection_count: subscribers.len(),
            subscription_count: subscribers.values().map(|s| s.pairs.len()).sum(),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of connections with at least one pair.
    pub connection_count: usize,
    /// Number of (connection, pair) subscriptions.
    pub subscription_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
