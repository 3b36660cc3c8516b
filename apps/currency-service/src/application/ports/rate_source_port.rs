//! Rate Source Port (Driven Port)
//!
//! Read access to the most recent rate table.

use std::sync::Arc;

use crate::domain::rates::{RateError, RateTable};

/// Port for reading the current rate table.
///
/// Implementations hand out a shared, immutable table so a caller can compute
/// every rate of one broadcast cycle from the same snapshot.
#[cfg_attr(test, mockall::automock)]
pub trait RateSource: Send + Sync {
    /// Get the current rate table.
    ///
    /// # Errors
    ///
    /// Returns [`RateError::Unavailable`] before the first table is loaded.
    fn snapshot(&self) -> Result<Arc<RateTable>, RateError>;
}

impl<T: RateSource + ?Sized> RateSource for Arc<T> {
    fn snapshot(&self) -> Result<Arc<RateTable>, RateError> {
        (**self).snapshot()
    }
}
