//! Concurrency limiter for blocking raster work.
//!
//! Rendering decodes and samples rasters on blocking threads. The limiter
//! caps how many renders run at once so a burst of tile requests queues
//! instead of exhausting memory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore-based limiter sized to the configured render threads.
#[derive(Debug)]
pub struct RenderLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: Arc<AtomicUsize>,
}

impl RenderLimiter {
    /// Creates a limiter allowing `permits` concurrent renders (at least one).
    pub fn new(permits: usize, label: impl Into<String>) -> Self {
        let permits = permits.max(1);
        let label: String = label.into();
        tracing::debug!(permits, label = %label, "Created render limiter");
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            max_permits: permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits for a permit. Returns `None` only after [`RenderLimiter::close`].
    pub async fn acquire(&self) -> Option<RenderPermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(self.wrap(permit))
    }

    fn wrap(&self, permit: OwnedSemaphorePermit) -> RenderPermit {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        RenderPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Stops handing out permits. Waiters receive `None`.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// Held for the duration of one render.
#[derive(Debug)]
pub struct RenderPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for RenderPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
