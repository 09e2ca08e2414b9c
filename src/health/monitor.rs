//! Per-service layered probe cycles.
//!
//! # Responsibilities
//! - Own the two probe cycles (proxy, then target) of one service
//! - Re-arm each cycle on a fixed interval after its probe settles
//! - Tear down and restart a cycle whenever the inputs it depends on change
//! - Publish verdicts on watch channels and as `VerdictEvent`s
//!
//! # State Machine (per layer)
//! ```text
//! Idle     ── inputs change, preconditions met ──▶ Armed
//! Armed    ── probe dispatched immediately     ──▶ Checking
//! Checking ── probe settles, verdict published ──▶ Settled
//! Settled  ── interval elapses                 ──▶ Checking
//! any      ── inputs change                    ──▶ cancel in-flight, Idle | Armed
//! ```
//!
//! # Design Decisions
//! - The target cycle subscribes to the proxy verdict channel; the proxy
//!   cycle never calls into it directly
//! - Verdict channels only notify on change, so a steady proxy verdict does
//!   not restart the target cycle every interval
//! - `stop()` and `Drop` both cancel; `stop()` also waits for the tasks

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::health::probe::{plan_probe, LayerInputs, ProbeClient, ProbeOutcome, ProbeRequest};
use crate::health::verdict::{Layer, Verdict};
use crate::observability::metrics;
use crate::service::model::ManagedService;

/// A verdict published by a layer cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerdictEvent {
    pub service: String,
    pub layer: Layer,
    pub verdict: Verdict,
}

/// Shared collaborators for every monitor a scheduler starts.
#[derive(Clone)]
pub struct MonitorContext {
    pub client: Arc<dyn ProbeClient>,
    pub interval: Duration,
    /// Scheme of proxy-layer URLs ("http" or "https").
    pub scheme: &'static str,
    pub events: broadcast::Sender<VerdictEvent>,
}

/// Handle owning the probe cycles of one service.
pub struct ServiceMonitor {
    name: String,
    service_tx: watch::Sender<ManagedService>,
    proxy_rx: watch::Receiver<Verdict>,
    target_rx: watch::Receiver<Verdict>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceMonitor {
    /// Spawn both layer cycles for `service`. Must be called inside a runtime.
    pub fn start(service: ManagedService, ctx: MonitorContext) -> Self {
        let name = service.name.clone();
        let cancel = CancellationToken::new();
        let (service_tx, service_rx) = watch::channel(service);
        let (proxy_tx, proxy_rx) = watch::channel(Verdict::Unknown);
        let (target_tx, target_rx) = watch::channel(Verdict::Unknown);

        let proxy = LayerTask {
            watch: LayerWatch {
                layer: Layer::Proxy,
                service: service_rx.clone(),
                dependency: None,
            },
            publisher: LayerPublisher {
                service: name.clone(),
                layer: Layer::Proxy,
                tx: proxy_tx,
                events: ctx.events.clone(),
                cancel: cancel.clone(),
            },
            ctx: ctx.clone(),
            cancel: cancel.clone(),
        };
        let target = LayerTask {
            watch: LayerWatch {
                layer: Layer::Target,
                service: service_rx,
                dependency: Some(proxy_rx.clone()),
            },
            publisher: LayerPublisher {
                service: name.clone(),
                layer: Layer::Target,
                tx: target_tx,
                events: ctx.events.clone(),
                cancel: cancel.clone(),
            },
            ctx,
            cancel: cancel.clone(),
        };

        tracing::debug!(service = %name, "Starting service monitor");
        let tasks = vec![tokio::spawn(proxy.run()), tokio::spawn(target.run())];

        Self {
            name,
            service_tx,
            proxy_rx,
            target_rx,
            cancel,
            tasks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the monitored entity. Cycles only restart if a field they
    /// depend on actually changed.
    pub fn update(&self, service: ManagedService) {
        self.service_tx.send_if_modified(|current| {
            if *current != service {
                *current = service;
                true
            } else {
                false
            }
        });
    }

    pub fn proxy_verdict(&self) -> Verdict {
        *self.proxy_rx.borrow()
    }

    pub fn target_verdict(&self) -> Verdict {
        *self.target_rx.borrow()
    }

    /// Cancel both cycles and wait until their tasks are gone. No verdict is
    /// published for this service once this returns.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!(service = %self.name, "Service monitor stopped");
    }
}

impl Drop for ServiceMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// The receivers one layer derives its inputs from.
#[derive(Clone)]
struct LayerWatch {
    layer: Layer,
    service: watch::Receiver<ManagedService>,
    dependency: Option<watch::Receiver<Verdict>>,
}

impl LayerWatch {
    /// Snapshot the inputs and mark them seen.
    fn capture(&mut self) -> LayerInputs {
        let dependency = self
            .dependency
            .as_mut()
            .map(|rx| *rx.borrow_and_update())
            .unwrap_or_default();
        let service = self.service.borrow_and_update();
        LayerInputs::capture(self.layer, &service, dependency)
    }

    /// Snapshot the inputs without marking them seen.
    fn peek(&self) -> LayerInputs {
        let dependency = self
            .dependency
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or_default();
        let service = self.service.borrow();
        LayerInputs::capture(self.layer, &service, dependency)
    }

    /// Resolves on any notification; false once a sender is gone.
    async fn notified(&mut self) -> bool {
        match self.dependency.as_mut() {
            Some(dependency) => tokio::select! {
                r = self.service.changed() => r.is_ok(),
                r = dependency.changed() => r.is_ok(),
            },
            None => self.service.changed().await.is_ok(),
        }
    }

    /// Wait until the inputs differ from `current`. Returns false when the
    /// monitor is cancelled or its channels close.
    async fn next_change(&mut self, current: &LayerInputs, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                alive = self.notified() => {
                    if !alive {
                        return false;
                    }
                }
            }
            if self.capture() != *current {
                return true;
            }
        }
    }
}

/// Publishes one layer's verdicts.
struct LayerPublisher {
    service: String,
    layer: Layer,
    tx: watch::Sender<Verdict>,
    events: broadcast::Sender<VerdictEvent>,
    cancel: CancellationToken,
}

impl LayerPublisher {
    /// `settled` marks a verdict coming from a completed probe; those are
    /// always broadcast, idle resets only when they change something.
    fn publish(&self, verdict: Verdict, settled: bool) {
        if self.cancel.is_cancelled() {
            return;
        }
        let changed = self.tx.send_if_modified(|current| {
            if *current != verdict {
                *current = verdict;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(
                service = %self.service,
                layer = %self.layer,
                verdict = %verdict,
                "Verdict changed"
            );
            metrics::record_service_health(&self.service, self.layer, verdict);
        }
        if changed || settled {
            let _ = self.events.send(VerdictEvent {
                service: self.service.clone(),
                layer: self.layer,
                verdict,
            });
        }
    }
}

struct LayerTask {
    watch: LayerWatch,
    publisher: LayerPublisher,
    ctx: MonitorContext,
    cancel: CancellationToken,
}

impl LayerTask {
    async fn run(mut self) {
        let layer = self.watch.layer;
        let service = self.publisher.service.clone();
        loop {
            let inputs = self.watch.capture();
            let changed = match plan_probe(&inputs, self.ctx.scheme) {
                None => {
                    self.publisher.publish(Verdict::Unknown, false);
                    tracing::debug!(service = %service, layer = %layer, "Layer idle");
                    self.watch.next_change(&inputs, &self.cancel).await
                }
                Some(request) => {
                    tracing::debug!(service = %service, layer = %layer, url = %request.url, "Layer armed");
                    let cycle = self.cancel.child_token();
                    let guard = self.watch.clone();
                    let changed = tokio::select! {
                        biased;
                        changed = self.watch.next_change(&inputs, &self.cancel) => changed,
                        _ = run_cycle(&request, &inputs, &guard, &self.publisher, &self.ctx, &cycle) => false,
                    };
                    cycle.cancel();
                    changed
                }
            };
            if !changed {
                break;
            }
            tracing::debug!(service = %service, layer = %layer, "Inputs changed, restarting cycle");
        }
        tracing::debug!(service = %service, layer = %layer, "Layer cycle exited");
    }
}

/// Probe, publish, wait one interval, repeat. Only returns once `cycle` is
/// cancelled.
async fn run_cycle(
    request: &ProbeRequest,
    inputs: &LayerInputs,
    guard: &LayerWatch,
    publisher: &LayerPublisher,
    ctx: &MonitorContext,
    cycle: &CancellationToken,
) {
    loop {
        let started = Instant::now();
        match ctx.client.probe(request, cycle).await {
            ProbeOutcome::Settled(verdict) => {
                if cycle.is_cancelled() || guard.peek() != *inputs {
                    tracing::debug!(
                        service = %publisher.service,
                        layer = %publisher.layer,
                        "Discarding probe result for stale inputs"
                    );
                    cycle.cancelled().await;
                    return;
                }
                metrics::record_probe(publisher.layer, verdict, started.elapsed());
                publisher.publish(verdict, true);
            }
            ProbeOutcome::Cancelled => {
                tracing::debug!(
                    service = %publisher.service,
                    layer = %publisher.layer,
                    "Probe cancelled"
                );
                return;
            }
        }

        tokio::select! {
            _ = cycle.cancelled() => return,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }
}
