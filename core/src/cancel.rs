/// cancel.rs — Cooperative cancellation and deadlines
///
/// The optimizer, the NF training epoch loop and the Monte Carlo
/// variance-forecast routine are the long-running operations in this
/// crate. Each checks a `CancellationToken` between iterations and an
/// optional `Deadline`; on trip, the caller returns `CoreError::Cancelled`
/// or `CoreError::Timeout` with the best iterate seen rather than raising.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn from_secs(timeout_secs: f64) -> Self {
        Self {
            start: Instant::now(),
            limit: Duration::from_secs_f64(timeout_secs.max(0.0)),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Checked at each cooperation point: returns `Err` the first
/// time either the token fires or the deadline passes.
pub fn check(token: &CancellationToken, deadline: Option<&Deadline>) -> Result<(), crate::error::CoreError> {
    if token.is_cancelled() {
        return Err(crate::error::CoreError::Cancelled);
    }
    if let Some(d) = deadline {
        if d.is_expired() {
            return Err(crate::error::CoreError::Timeout { elapsed_secs: d.elapsed_secs() });
        }
    }
    Ok(())
}
