//! Minimum-duration visibility gate for busy indicators.
//!
//! The `false → true` edge is published immediately; the `true → false` edge
//! is held back until the indicator has been visible for at least the floor
//! duration. A new `true` always cancels a held-back `false`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct GateSlot {
    started: Option<Instant>,
    /// Bumped on every transition request; a delayed `false` only lands if
    /// nothing happened since it was scheduled.
    epoch: u64,
    pending: Option<JoinHandle<()>>,
}

struct GateInner {
    floor: Duration,
    busy: watch::Sender<bool>,
    slot: Mutex<GateSlot>,
}

impl GateInner {
    fn slot(&self) -> MutexGuard<'_, GateSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Busy signal with a guaranteed minimum visible duration.
#[derive(Clone)]
pub struct MinDurationGate {
    inner: Arc<GateInner>,
}

impl MinDurationGate {
    pub fn new(floor: Duration) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(GateInner {
                floor,
                busy,
                slot: Mutex::new(GateSlot {
                    started: None,
                    epoch: 0,
                    pending: None,
                }),
            }),
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.inner.busy.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy.subscribe()
    }

    /// Request a transition. Must be called inside a runtime.
    pub fn set_busy(&self, busy: bool) {
        let mut slot = self.inner.slot();
        slot.epoch += 1;
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }

        if busy {
            slot.started = Some(Instant::now());
            self.inner.busy.send_replace(true);
            return;
        }

        let remaining = slot
            .started
            .map(|started| self.inner.floor.saturating_sub(started.elapsed()))
            .unwrap_or_default();
        if remaining.is_zero() {
            slot.started = None;
            self.inner.busy.send_replace(false);
            return;
        }

        let epoch = slot.epoch;
        let inner = Arc::clone(&self.inner);
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            let mut slot = inner.slot();
            if slot.epoch == epoch {
                slot.started = None;
                slot.pending = None;
                inner.busy.send_replace(false);
            }
        }));
    }

    /// Mark busy until the returned guard is dropped.
    pub fn begin(&self) -> BusyGuard {
        self.set_busy(true);
        BusyGuard { gate: self.clone() }
    }
}

/// Clears the busy signal (subject to the floor) when dropped, on every
/// exit path.
pub struct BusyGuard {
    gate: MinDurationGate,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.gate.set_busy(false);
    }
}
