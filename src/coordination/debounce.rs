//! Debounced remote validation of a single input field.
//!
//! # Responsibilities
//! - Coalesce bursts of input changes into one delayed remote check
//! - Make sure only the newest scheduled check can publish a result
//! - Offer an immediate `validate_now` for explicit confirmation
//!
//! # Design Decisions
//! - One pending slot per field: scheduling a check cancels the previous one
//! - Every state change is tagged with a generation; stale tasks are ignored
//! - Unchanged input (the committed baseline) never costs a network call
//! - Malformed input is rejected locally before any network call

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;
use crate::observability::metrics;
use crate::service::validation::is_valid_listen_addr;

/// Answer from the remote availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResponse {
    pub available: bool,
    pub error: Option<String>,
}

/// Remote check the validator debounces.
#[async_trait]
pub trait AvailabilityCheck: Send + Sync + 'static {
    async fn check(&self, value: &str) -> Result<CheckResponse, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Idle,
    Checking,
    Available,
    Unavailable,
    Error,
}

/// What the field currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationState {
    pub status: ValidationStatus,
    pub message: Option<String>,
}

impl ValidationState {
    fn idle() -> Self {
        Self::with(ValidationStatus::Idle, None)
    }

    fn with(status: ValidationStatus, message: Option<String>) -> Self {
        Self { status, message }
    }
}

/// Verdict returned to callers of `validate_now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckVerdict {
    pub available: bool,
    pub message: Option<String>,
}

impl CheckVerdict {
    fn available() -> Self {
        Self {
            available: true,
            message: None,
        }
    }

    /// Field state matching a settled remote answer.
    fn to_state(&self) -> ValidationState {
        if self.available {
            ValidationState::with(ValidationStatus::Available, None)
        } else {
            ValidationState::with(ValidationStatus::Unavailable, self.message.clone())
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: Some(message.into()),
        }
    }
}

struct Pending {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Slot {
    baseline: String,
    generation: u64,
    pending: Option<Pending>,
    /// Last settled remote answer and the value it was for.
    cached: Option<(String, CheckVerdict)>,
}

impl Slot {
    /// Invalidate everything scheduled so far and return the new generation.
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            pending.handle.abort();
        }
        self.generation
    }
}

struct Inner {
    checker: Arc<dyn AvailabilityCheck>,
    delay: Duration,
    format_check: fn(&str) -> bool,
    state: watch::Sender<ValidationState>,
    slot: Mutex<Slot>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_if_current(&self, generation: u64, state: ValidationState) -> bool {
        let slot = self.slot();
        if slot.generation != generation {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    async fn run_check(&self, value: &str, generation: u64, cancel: &CancellationToken) -> Option<CheckVerdict> {
        if value.trim().is_empty() {
            self.publish_if_current(generation, ValidationState::idle());
            return Some(CheckVerdict::available());
        }

        if !(self.format_check)(value) {
            let verdict = CheckVerdict::rejected("invalid format");
            self.publish_if_current(
                generation,
                ValidationState::with(ValidationStatus::Error, verdict.message.clone()),
            );
            return Some(verdict);
        }

        if !self.publish_if_current(generation, ValidationState::with(ValidationStatus::Checking, None)) {
            return None;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = self.checker.check(value) => result,
        };

        let (state, verdict, cacheable) = match result {
            Ok(response) if response.available => {
                metrics::record_validation("available");
                (
                    ValidationState::with(ValidationStatus::Available, None),
                    CheckVerdict::available(),
                    true,
                )
            }
            Ok(response) => {
                metrics::record_validation("unavailable");
                let message = response.error.unwrap_or_else(|| "not available".to_string());
                (
                    ValidationState::with(ValidationStatus::Unavailable, Some(message.clone())),
                    CheckVerdict::rejected(message),
                    true,
                )
            }
            Err(e) => {
                metrics::record_validation("error");
                tracing::warn!(value = %value, error = %e, "Validation call failed");
                let message = format!("check failed: {}", e);
                (
                    ValidationState::with(ValidationStatus::Error, Some(message.clone())),
                    CheckVerdict::rejected(message),
                    false,
                )
            }
        };

        let mut slot = self.slot();
        if slot.generation == generation {
            if cacheable {
                slot.cached = Some((value.to_string(), verdict.clone()));
            }
            self.state.send_replace(state);
        } else {
            tracing::debug!(value = %value, "Discarding superseded validation result");
        }
        Some(verdict)
    }
}

/// Debounced validator for one field.
pub struct DebouncedValidator {
    inner: Arc<Inner>,
}

impl DebouncedValidator {
    /// Create a validator whose committed value is `baseline`, using the
    /// listen address format check.
    pub fn new(checker: Arc<dyn AvailabilityCheck>, baseline: impl Into<String>, delay: Duration) -> Self {
        Self::with_format_check(checker, baseline, delay, is_valid_listen_addr)
    }

    /// Like `new`, with a custom cheap local check run before any remote call.
    pub fn with_format_check(
        checker: Arc<dyn AvailabilityCheck>,
        baseline: impl Into<String>,
        delay: Duration,
        format_check: fn(&str) -> bool,
    ) -> Self {
        let (state, _) = watch::channel(ValidationState::idle());
        Self {
            inner: Arc::new(Inner {
                checker,
                delay,
                format_check,
                state,
                slot: Mutex::new(Slot {
                    baseline: baseline.into(),
                    generation: 0,
                    pending: None,
                    cached: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> ValidationState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ValidationState> {
        self.inner.state.subscribe()
    }

    pub fn baseline(&self) -> String {
        self.inner.slot().baseline.clone()
    }

    /// Record a newly committed value (e.g., after a successful save).
    pub fn set_baseline(&self, value: impl Into<String>) {
        let mut slot = self.inner.slot();
        slot.supersede();
        slot.baseline = value.into();
        slot.cached = None;
        self.inner.state.send_replace(ValidationState::idle());
    }

    /// React to an edit. Must be called inside a runtime.
    pub fn on_input_changed(&self, value: &str) {
        let mut slot = self.inner.slot();
        let generation = slot.supersede();

        if slot.cached.as_ref().is_some_and(|(cached, _)| cached != value) {
            slot.cached = None;
        }
        if value == slot.baseline {
            self.inner.state.send_replace(ValidationState::idle());
            return;
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let value = value.to_string();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => return,
                _ = tokio::time::sleep(inner.delay) => {}
            }
            inner.run_check(&value, generation, &task_cancel).await;
        });
        slot.pending = Some(Pending { cancel, handle });
    }

    /// Validate immediately, bypassing the debounce window.
    ///
    /// The committed baseline and a value whose answer is already cached
    /// return without a network call.
    pub async fn validate_now(&self, value: &str) -> CheckVerdict {
        let generation = {
            let mut slot = self.inner.slot();
            if value == slot.baseline {
                slot.supersede();
                self.inner.state.send_replace(ValidationState::idle());
                return CheckVerdict::available();
            }
            let hit = slot
                .cached
                .as_ref()
                .filter(|(cached, _)| cached == value)
                .map(|(_, verdict)| verdict.clone());
            if let Some(verdict) = hit {
                slot.supersede();
                self.inner.state.send_replace(verdict.to_state());
                return verdict;
            }
            slot.supersede()
        };

        let cancel = CancellationToken::new();
        match self.inner.run_check(value, generation, &cancel).await {
            Some(verdict) => verdict,
            None => CheckVerdict::rejected("superseded by a newer edit"),
        }
    }
}

impl Drop for DebouncedValidator {
    fn drop(&mut self) {
        self.inner.slot().supersede();
    }
}
