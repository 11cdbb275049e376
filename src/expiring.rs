use std::time::Duration;

use tokio::time::Instant;

/// Represents a value stamped with its creation time and an optional expiry
#[derive(Debug, Clone)]
pub struct Expiring<T> {
    pub value: T,
    pub created_at: Instant,
    pub expires_at: Option<Instant>,
}

impl<T> Expiring<T> {
    /// Creates a new expiring value; `None` never expires
    pub fn new(value: T, expires_at: Option<Instant>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            expires_at,
        }
    }

    /// Creates a value that expires `expiry` after now.
    ///
    /// `None`, or an expiry too far out to be represented as an instant, never expires.
    pub fn with_duration(value: T, expiry: Option<Duration>) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            expires_at: expiry.and_then(|expiry| created_at.checked_add(expiry)),
        }
    }

    /// Creates a value that never expires
    pub fn never(value: T) -> Self {
        Self::new(value, None)
    }

    /// Checks if this item has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Time elapsed since the value was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
