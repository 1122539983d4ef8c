// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-cluster operation dispatch.
//!
//! One reconcile may touch many member clusters. The dispatcher runs one
//! unit of work per target cluster concurrently, so a slow or failing
//! cluster never blocks or corrupts another cluster's outcome, and offers
//! a single join point (`wait`) for the aggregate result.
//!
//! Retry is not the dispatcher's job: the owning reconcile loop re-queues
//! the resource when `wait` reports failure.

use crate::domain::object::{GroupVersionKind, ResourceObject};
use crate::domain::resource::{QualifiedName, NAMESPACE_KIND};
use crate::infrastructure::client::{ClusterClientAccessor, ResourceClient};
use anyhow::anyhow;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

/// Failure of one cluster operation, rendered with the uniform template
/// used for operator-facing error reporting.
#[derive(Debug, thiserror::Error)]
#[error("Failed to {operation} {target_kind} {target_name:?} in cluster {cluster_name:?}: {source}")]
pub struct ClusterOperationError {
    pub operation: String,
    pub target_kind: String,
    pub target_name: String,
    pub cluster_name: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

/// Identifies one unit of dispatched work for error wrapping.
#[derive(Debug, Clone)]
struct OperationContext {
    operation: String,
    target_kind: String,
    target_name: String,
    cluster_name: String,
}

impl OperationContext {
    fn wrap(&self, source: anyhow::Error) -> ClusterOperationError {
        ClusterOperationError {
            operation: self.operation.clone(),
            target_kind: self.target_kind.clone(),
            target_name: self.target_name.clone(),
            cluster_name: self.cluster_name.clone(),
            source: source.into(),
        }
    }
}

type OperationOutcome = Result<(), ClusterOperationError>;

/// Fans out operations across member clusters and aggregates outcomes.
pub struct OperationDispatcher {
    clients: Arc<dyn ClusterClientAccessor>,
    operations_initiated: AtomicUsize,
    results_tx: mpsc::UnboundedSender<OperationOutcome>,
    results_rx: Mutex<mpsc::UnboundedReceiver<OperationOutcome>>,
}

impl OperationDispatcher {
    pub fn new(clients: Arc<dyn ClusterClientAccessor>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            clients,
            operations_initiated: AtomicUsize::new(0),
            results_tx,
            results_rx: Mutex::new(results_rx),
        }
    }

    /// Runs `operation` against `cluster_name` as an independent task.
    ///
    /// The initiation count is incremented synchronously before the task
    /// is spawned so that `wait` can never observe a spawned task it does
    /// not know to collect.
    fn cluster_operation<F, Fut>(&self, context: OperationContext, operation: F)
    where
        F: FnOnce(Arc<dyn ResourceClient>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.operations_initiated.fetch_add(1, Ordering::SeqCst);
        let clients = Arc::clone(&self.clients);
        let results_tx = self.results_tx.clone();

        tokio::spawn(async move {
            let result = match clients.client_for(&context.cluster_name) {
                Some(client) => operation(client).await,
                None => Err(anyhow!("no client available for cluster")),
            };
            let outcome = result.map_err(|source| context.wrap(source));
            if let Err(err) = &outcome {
                error!(error = %err, "Cluster operation failed");
            }
            let _ = results_tx.send(outcome);
        });
    }

    /// Blocks until every initiated operation has reported an outcome.
    /// Returns whether all succeeded, plus the first recorded error.
    pub async fn wait(&self) -> (bool, Option<ClusterOperationError>) {
        let expected = self.operations_initiated.load(Ordering::SeqCst);
        let mut results_rx = self.results_rx.lock().await;

        let mut all_succeeded = true;
        let mut first_error = None;
        for _ in 0..expected {
            match results_rx.recv().await {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    all_succeeded = false;
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                None => break,
            }
        }
        self.operations_initiated.store(0, Ordering::SeqCst);
        (all_succeeded, first_error)
    }
}

/// Target name as it appears inside a member cluster. Namespace targets
/// are cluster-scoped there, so the namespace component is dropped.
fn target_name_in_cluster(target_gvk: &GroupVersionKind, target_name: &QualifiedName) -> QualifiedName {
    if target_gvk.kind == NAMESPACE_KIND {
        QualifiedName::cluster_scoped(target_name.name.clone())
    } else {
        target_name.clone()
    }
}

/// Dispatches operations for resources whose owning federated resource
/// has been removed: delete the target, or strip its managed label so it
/// is left behind unmanaged.
pub struct UnmanagedDispatcher {
    dispatcher: OperationDispatcher,
    target_gvk: GroupVersionKind,
    target_name: QualifiedName,
}

impl UnmanagedDispatcher {
    pub fn new(
        clients: Arc<dyn ClusterClientAccessor>,
        target_gvk: GroupVersionKind,
        target_name: QualifiedName,
    ) -> Self {
        Self {
            dispatcher: OperationDispatcher::new(clients),
            target_gvk,
            target_name,
        }
    }

    pub async fn wait(&self) -> (bool, Option<ClusterOperationError>) {
        self.dispatcher.wait().await
    }

    pub fn delete(&self, cluster_name: &str) {
        let start = Instant::now();
        let gvk = self.target_gvk.clone();
        let target_name = target_name_in_cluster(&self.target_gvk, &self.target_name);
        info!(
            kind = %gvk.kind,
            target = %target_name,
            cluster = cluster_name,
            "Deleting target resource"
        );
        self.dispatcher.cluster_operation(
            self.operation_context("delete", cluster_name),
            move |client| async move {
                match client.delete(&gvk, &target_name.namespace, &target_name.name).await {
                    // Delete is idempotent: the resource being gone already
                    // is the desired end state.
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(err.into()),
                    Ok(()) => {
                        metrics::histogram!(
                            "federation_dispatch_operation_duration_seconds",
                            "operation" => "delete"
                        )
                        .record(start.elapsed().as_secs_f64());
                        Ok(())
                    }
                }
            },
        );
    }

    pub fn remove_managed_label(&self, cluster_name: &str, cluster_obj: &ResourceObject) {
        info!(
            kind = %self.target_gvk.kind,
            target = %target_name_in_cluster(&self.target_gvk, &self.target_name),
            cluster = cluster_name,
            "Removing managed label from target resource"
        );
        // Patch a copy: the passed object may come straight from an
        // informer cache.
        let mut update_obj = cluster_obj.clone();
        update_obj.remove_managed_label();
        self.dispatcher.cluster_operation(
            self.operation_context("remove managed label from", cluster_name),
            move |client| async move {
                client.patch(&update_obj).await?;
                Ok(())
            },
        );
    }

    fn operation_context(&self, operation: &str, cluster_name: &str) -> OperationContext {
        OperationContext {
            operation: operation.to_string(),
            target_kind: self.target_gvk.kind.clone(),
            target_name: target_name_in_cluster(&self.target_gvk, &self.target_name).to_string(),
            cluster_name: cluster_name.to_string(),
        }
    }
}

/// Predicate identifying the namespace hosting the control plane itself;
/// that namespace may legitimately be pending deletion without the check
/// failing.
pub type HostNamespaceCheck = Arc<dyn Fn(&ResourceObject) -> bool + Send + Sync>;

/// Read-only verification that a target resource was actually removed or
/// relabeled, used to confirm eventual consistency before declaring
/// cleanup complete.
pub struct CheckUnmanagedDispatcher {
    dispatcher: OperationDispatcher,
    target_gvk: GroupVersionKind,
    target_name: QualifiedName,
}

impl CheckUnmanagedDispatcher {
    pub fn new(
        clients: Arc<dyn ClusterClientAccessor>,
        target_gvk: GroupVersionKind,
        target_name: QualifiedName,
    ) -> Self {
        Self {
            dispatcher: OperationDispatcher::new(clients),
            target_gvk,
            target_name,
        }
    }

    pub async fn wait(&self) -> (bool, Option<ClusterOperationError>) {
        self.dispatcher.wait().await
    }

    /// Checks that the resource either does not exist in the cluster or
    /// no longer carries the managed label.
    pub fn check_removed_or_unlabeled(&self, cluster_name: &str, is_host_namespace: HostNamespaceCheck) {
        let gvk = self.target_gvk.clone();
        let target_name = target_name_in_cluster(&self.target_gvk, &self.target_name);
        info!(
            kind = %gvk.kind,
            target = %target_name,
            cluster = cluster_name,
            "Checking for deletion of resource or removal of managed label"
        );
        self.dispatcher.cluster_operation(
            self.operation_context(cluster_name),
            move |client| async move {
                let cluster_obj =
                    match client.get(&gvk, &target_name.namespace, &target_name.name).await {
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err.into()),
                        Ok(obj) => obj,
                    };
                if cluster_obj.is_pending_deletion() {
                    if is_host_namespace(&cluster_obj) {
                        return Ok(());
                    }
                    return Err(anyhow!("resource is pending deletion"));
                }
                if !cluster_obj.has_managed_label() {
                    return Ok(());
                }
                Err(anyhow!("resource still has the managed label"))
            },
        );
    }

    fn operation_context(&self, cluster_name: &str) -> OperationContext {
        OperationContext {
            operation: "check for deletion of resource or removal of managed label from"
                .to_string(),
            target_kind: self.target_gvk.kind.clone(),
            target_name: target_name_in_cluster(&self.target_gvk, &self.target_name).to_string(),
            cluster_name: cluster_name.to_string(),
        }
    }
}
