// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reconcile worker.
//!
//! A single consumer drains a queue of qualified names, so reconciles for
//! a component are serialized: at most one in flight at a time. Error
//! statuses are re-queued after a delay instead of retried in place.

use crate::domain::resource::{QualifiedName, ReconciliationStatus};
use crate::infrastructure::informer::EnqueueHandler;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const REQUEUE_DELAY: Duration = Duration::from_secs(1);

pub type ReconcileHandler =
    Arc<dyn Fn(QualifiedName) -> BoxFuture<'static, ReconciliationStatus> + Send + Sync>;

pub struct ReconcileWorker {
    name: String,
    tx: mpsc::UnboundedSender<QualifiedName>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<QualifiedName>>>,
}

impl ReconcileWorker {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn enqueue(&self, qualified_name: QualifiedName) {
        let _ = self.tx.send(qualified_name);
    }

    /// Adapter for informer wiring: enqueues the notification's object.
    pub fn enqueue_handler(&self) -> EnqueueHandler {
        let tx = self.tx.clone();
        Arc::new(move |obj| {
            let _ = tx.send(obj.qualified_name());
        })
    }

    /// Starts the consumer loop; non-blocking. Panics if called twice.
    pub fn run(&self, shutdown: CancellationToken, handler: ReconcileHandler) -> JoinHandle<()> {
        let mut rx = self
            .rx
            .lock()
            .expect("reconcile worker lock")
            .take()
            .expect("reconcile worker already running");
        let name = self.name.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            info!(worker = %name, "Starting reconcile worker");
            loop {
                let qualified_name = tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(qualified_name) => qualified_name,
                        None => break,
                    },
                    _ = shutdown.cancelled() => break,
                };

                let start = Instant::now();
                let status = handler(qualified_name.clone()).await;
                metrics::histogram!("federation_reconcile_duration_seconds", "worker" => name.clone())
                    .record(start.elapsed().as_secs_f64());

                if status == ReconciliationStatus::Error {
                    warn!(worker = %name, key = %qualified_name, "Reconcile failed, re-queueing");
                    let tx = tx.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = tokio::time::sleep(REQUEUE_DELAY) => {
                                let _ = tx.send(qualified_name);
                            }
                            _ = shutdown.cancelled() => {}
                        }
                    });
                } else {
                    debug!(worker = %name, key = %qualified_name, "Reconcile complete");
                }
            }
            info!(worker = %name, "Reconcile worker stopped");
        })
    }
}
