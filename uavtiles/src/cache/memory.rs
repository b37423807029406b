//! In-memory cache provider backed by `moka::future::Cache`.

use bytes::Bytes;
use moka::future::Cache as MokaCache;

use super::traits::{BoxFuture, Cache, ServiceCacheError};

/// Byte-weighted LRU cache.
pub struct MemoryCacheProvider {
    cache: MokaCache<String, Bytes>,
    max_size_bytes: u64,
}

impl MemoryCacheProvider {
    /// Create a provider holding at most `max_size_bytes` of values.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            // moka weights are u32
            .weigher(|_key: &String, value: &Bytes| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();
        Self {
            cache,
            max_size_bytes,
        }
    }

    /// Apply pending inserts and evictions to the size counters.
    #[cfg(test)]
    async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Cache for MemoryCacheProvider {
    fn set(&self, key: &str, value: Bytes) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            if value.len() as u64 > self.max_size_bytes {
                return Err(ServiceCacheError::ValueTooLarge {
                    size: value.len(),
                    max: self.max_size_bytes as usize,
                });
            }
            self.cache.insert(key, value).await;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Bytes>, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}
