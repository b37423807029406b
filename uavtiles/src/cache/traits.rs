//! Async key-value cache interface.
//!
//! Keys are strings so entries stay readable in logs. Values are [`Bytes`],
//! which lets a hit hand out the stored buffer without copying it.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum ServiceCacheError {
    /// Value exceeds what a single entry may weigh.
    #[error("Value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Generic byte cache.
///
/// Implementations evict on their own. All methods are usable through
/// `Arc<dyn Cache>`.
pub trait Cache: Send + Sync {
    /// Store a value, replacing any previous entry for `key`.
    fn set(&self, key: &str, value: Bytes) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Bytes>, ServiceCacheError>>;

    /// Weighted size of all entries in bytes.
    fn size_bytes(&self) -> u64;

    fn entry_count(&self) -> u64;

    fn max_size_bytes(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = ServiceCacheError::ValueTooLarge { size: 100, max: 50 };
        assert_eq!(err.to_string(), "Value too large: 100 bytes (max: 50)");
    }
}
