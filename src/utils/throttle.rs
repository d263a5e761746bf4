//! Bounded-parallelism permit pool.
//!
//! [`Throttle`] caps how many import operations touch files, sockets or
//! subprocesses at the same time. It is a thin wrapper over
//! [`tokio::sync::Semaphore`], whose wait queue is FIFO: a released permit
//! goes to the oldest waiter. Permits are released when the returned guard
//! drops, so every exit path of [`Throttle::run`] (success, error or
//! cancellation) gives its permit back.

use crate::core::ImportError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Counting permit pool shared by all resolutions of one expansion run.
#[derive(Debug, Clone)]
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    permits: usize,
}

impl Throttle {
    /// Create a pool of `permits` slots.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::InvalidThrottle`] when `permits` is zero.
    pub fn new(permits: usize) -> Result<Self, ImportError> {
        if permits == 0 {
            return Err(ImportError::InvalidThrottle {
                permits,
            });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            permits,
        })
    }

    /// Total number of slots.
    #[must_use]
    pub const fn permits(&self) -> usize {
        self.permits
    }

    /// Slots not currently held.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a slot. The slot is released when the guard drops.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, ImportError> {
        self.semaphore.acquire().await.map_err(|_| ImportError::ThrottleClosed)
    }

    /// Run `operation` while holding a slot.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, ImportError>
    where
        F: Future<Output = Result<T, ImportError>>,
    {
        let _permit = self.acquire().await?;
        operation.await
    }
}
