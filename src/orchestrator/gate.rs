//! Counting admission control for running tasks.
//!
//! The [`ConcurrencyGate`] hands out one [`GatePermit`] per task. Permits are
//! granted in request order (the underlying Tokio semaphore is fair) and are
//! returned when dropped, whatever the task's terminal status.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::MAX_CONCURRENT_CEILING;

/// A slot held by one running task. Dropping it frees the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounds the number of simultaneously running tasks across a whole plan.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Errors from the gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("concurrency gate has been closed")]
    Closed,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots, clamped to
    /// `1..=MAX_CONCURRENT_CEILING`. Zero would deadlock a plan.
    pub fn new(capacity: usize) -> Self {
        let requested = capacity;
        let capacity = capacity.clamp(1, MAX_CONCURRENT_CEILING);
        if capacity != requested {
            warn!(requested, capacity, "gate capacity clamped");
        }
        debug!(capacity, "concurrency gate created");
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed)?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots ever held at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
