//! Bounded worker pool for accepted connections.

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Limits how many connections are served at once.
///
/// A connection holds its permit for its whole lifetime; connections beyond
/// capacity wait until a permit is released.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConnectionPool {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of connections currently holding a permit.
    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        if self.semaphore.available_permits() == 0 {
            tracing::warn!(
                "Connection pool exhausted ({} in use), waiting for a free slot",
                self.capacity
            );
        }
        self.semaphore.clone().acquire_owned().await
    }

    /// Stop handing out permits; waiting connections get an error.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
