// src/core/pacing.rs - Display pacing and cooperative turn cancellation

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Display update policy while streaming: at most one update per fragment,
/// and never two updates closer together than `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    interval: Duration,
}

impl Pacing {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Update as fast as fragments arrive.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to hold the next update when `elapsed` has passed since the previous one.
    pub fn delay_after(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

/// Tracks the last display update of one turn.
#[derive(Debug)]
pub struct Pacer {
    pacing: Pacing,
    last_update: Option<Instant>,
}

impl Pacer {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            last_update: None,
        }
    }

    /// Time to wait before the next update may be shown.
    pub fn remaining(&self) -> Duration {
        match self.last_update {
            Some(at) => self.pacing.delay_after(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    pub fn mark(&mut self) {
        self.last_update = Some(Instant::now());
    }
}

/// Creates a connected stop handle and signal for one turn.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(Arc::new(tx)), StopSignal(rx))
}

/// Requests that a running turn stop generating.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by the controller at each suspension point.
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        StopSignal(rx)
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop was requested. Pends forever if the handle is gone.
    pub async fn stopped(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Routes an interrupt to the turn in progress, if any.
#[derive(Debug, Clone, Default)]
pub struct InterruptRouter {
    active: Arc<Mutex<Option<StopHandle>>>,
}

impl InterruptRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start routing interrupts to a new turn and return the signal it watches.
    pub fn arm(&self) -> StopSignal {
        let (handle, signal) = stop_channel();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(handle);
        }
        signal
    }

    pub fn disarm(&self) {
        if let Ok(mut active) = self.active.lock() {
            active.take();
        }
    }

    /// Stop the running turn. Returns false when no turn is running.
    pub fn interrupt(&self) -> bool {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(handle) => {
                    handle.stop();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}
