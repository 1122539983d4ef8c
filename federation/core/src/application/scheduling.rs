// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scheduling manager.
//!
//! Owns the lifecycle of per-resource-kind scheduling-preference
//! controllers, keyed off federation type-configuration objects that are
//! added and removed at runtime. A controller is started lazily when the
//! first type config referencing its kind appears and torn down when its
//! last plugin is removed. The preference algorithm itself is external;
//! only its lifecycle is managed here.

use crate::domain::config::ControllerConfig;
use crate::domain::object::ApiResource;
use crate::domain::resource::{
    QualifiedName, ReconciliationStatus, NAMESPACE_TYPE_CONFIG_NAME,
};
use crate::domain::typeconfig::FederatedTypeConfig;
use crate::infrastructure::informer::{Informer, InformerFactory};
use crate::infrastructure::registry::SafeMap;
use crate::infrastructure::worker::{ReconcileHandler, ReconcileWorker};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const REPLICA_SCHEDULING_PREFERENCE_KIND: &str = "ReplicaSchedulingPreference";

/// The closed set of supported scheduling strategies, resolved from a
/// type config's name. Not every kind is schedulable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulingKind {
    Replica,
}

impl SchedulingKind {
    pub fn for_type_config_name(type_config_name: &str) -> Option<Self> {
        match type_config_name {
            "deployments.apps" | "replicasets.apps" => Some(Self::Replica),
            _ => None,
        }
    }

    /// Kind of the scheduling-preference resource driving this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replica => REPLICA_SCHEDULING_PREFERENCE_KIND,
        }
    }
}

/// A running scheduling-preference controller, capable of hosting one
/// plugin per federated kind.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Starts a plugin for the type config's federated kind; the federated
    /// namespace resource is required to compute placement scoping.
    async fn start_plugin(
        &self,
        type_config: &FederatedTypeConfig,
        fed_namespace_resource: &ApiResource,
    ) -> anyhow::Result<()>;

    async fn stop_plugin(&self, federated_kind: &str);
}

/// Starts the preference controller for a scheduling kind. The controller
/// runs until the given token is cancelled.
#[async_trait]
pub trait SchedulerFactory: Send + Sync {
    async fn start_scheduler(
        &self,
        kind: SchedulingKind,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Arc<dyn Scheduler>>;
}

/// Runtime record for one active scheduling kind: the controller's
/// cancellation signal plus the registry of plugins keyed by type-config
/// name. The registry exists because type configs can have any name while
/// plugins run per federated kind; it also keeps a second type config for
/// the same federated kind from starting a duplicate plugin.
pub struct SchedulerWrapper {
    shutdown: CancellationToken,
    plugins: SafeMap<String>,
    scheduler: Arc<dyn Scheduler>,
}

impl SchedulerWrapper {
    fn new(scheduler: Arc<dyn Scheduler>, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            shutdown,
            plugins: SafeMap::new(),
            scheduler,
        })
    }

    pub fn has_plugin(&self, type_config_name: &str) -> bool {
        self.plugins.get(type_config_name).is_some()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.size()
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.scheduler)
    }
}

pub struct SchedulingManager {
    config: ControllerConfig,
    informer: Arc<dyn Informer>,
    worker: ReconcileWorker,
    schedulers: SafeMap<Arc<SchedulerWrapper>>,
    factory: Arc<dyn SchedulerFactory>,
}

impl SchedulingManager {
    pub fn new(
        config: ControllerConfig,
        factory: Arc<dyn SchedulerFactory>,
        informers: &dyn InformerFactory,
    ) -> anyhow::Result<Arc<Self>> {
        let worker = ReconcileWorker::new("schedulingmanager");
        let informer = informers
            .informer(
                &FederatedTypeConfig::api_resource(),
                &config.federation_namespace,
                worker.enqueue_handler(),
            )
            .context("Failed to start an informer for type configs")?;

        Ok(Arc::new(Self {
            config,
            informer,
            worker,
            schedulers: SafeMap::new(),
            factory,
        }))
    }

    /// Constructs the manager and runs it; returns once its cache has
    /// synced and the worker is consuming.
    pub async fn start(
        config: ControllerConfig,
        factory: Arc<dyn SchedulerFactory>,
        informers: &dyn InformerFactory,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Arc<Self>> {
        let manager = Self::new(config, factory, informers)?;
        info!("Starting scheduling manager");
        manager.run(shutdown).await?;
        Ok(manager)
    }

    pub fn get_scheduler(&self, scheduling_kind: &str) -> Option<Arc<SchedulerWrapper>> {
        self.schedulers.get(scheduling_kind)
    }

    pub fn has_synced(&self) -> bool {
        self.informer.has_synced()
    }

    pub async fn run(self: &Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        self.informer.run(shutdown.clone());
        wait_for_cache_sync(self.informer.as_ref(), &shutdown)
            .await
            .context("Timed out waiting for the cache to sync in the scheduling manager")?;

        let manager = Arc::clone(self);
        let handler: ReconcileHandler = Arc::new(move |qualified_name| {
            let manager = Arc::clone(&manager);
            Box::pin(async move { manager.reconcile(qualified_name).await })
        });
        let _ = self.worker.run(shutdown.clone(), handler);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            shutdown.cancelled().await;
            manager.shutdown();
        });
        Ok(())
    }

    /// Cancels every remaining per-kind controller. Tokens are idempotent,
    /// so racing a concurrent per-kind teardown is harmless.
    fn shutdown(&self) {
        for wrapper in self.schedulers.get_all() {
            wrapper.shutdown.cancel();
        }
    }

    /// Reconciles one type config against the active scheduler set.
    /// Invoked by the manager's worker; exposed for driving directly.
    pub async fn reconcile(&self, qualified_name: QualifiedName) -> ReconciliationStatus {
        let start = Instant::now();
        let status = self.reconcile_type_config(&qualified_name).await;
        metrics::histogram!(
            "federation_reconcile_duration_seconds",
            "controller" => "schedulingmanager"
        )
        .record(start.elapsed().as_secs_f64());
        status
    }

    async fn reconcile_type_config(&self, qualified_name: &QualifiedName) -> ReconciliationStatus {
        let key = qualified_name.to_string();
        debug!(key = %key, "Reconciling type config in scheduling manager");

        let type_config_name = qualified_name.name.clone();
        let Some(scheduling_kind) = SchedulingKind::for_type_config_name(&type_config_name) else {
            // No scheduler supported for this resource.
            return ReconciliationStatus::AllOk;
        };

        let Some(cached) = self.informer.store().get_by_key(&key) else {
            self.stop_scheduler(scheduling_kind, &type_config_name).await;
            return ReconciliationStatus::AllOk;
        };
        let mut type_config = match FederatedTypeConfig::from_object(&cached) {
            Ok(type_config) => type_config,
            Err(err) => {
                error!(key = %key, error = %err, "Failed to decode type config");
                return ReconciliationStatus::Error;
            }
        };

        if !type_config.propagation_enabled() || type_config.pending_deletion() {
            self.stop_scheduler(scheduling_kind, &type_config_name).await;
            return ReconciliationStatus::AllOk;
        }

        type_config.set_defaults();

        // The preference controller is started on demand with its own
        // cancellation signal, so stopping one kind never affects others.
        let wrapper = match self.schedulers.get(scheduling_kind.name()) {
            Some(wrapper) => wrapper,
            None => {
                info!(kind = scheduling_kind.name(), "Starting scheduling preference controller");
                let controller_shutdown = CancellationToken::new();
                let scheduler = match self
                    .factory
                    .start_scheduler(scheduling_kind, &self.config, controller_shutdown.clone())
                    .await
                {
                    Ok(scheduler) => scheduler,
                    Err(err) => {
                        error!(
                            kind = scheduling_kind.name(),
                            error = %err,
                            "Error starting scheduling preference controller"
                        );
                        return ReconciliationStatus::Error;
                    }
                };
                let wrapper = SchedulerWrapper::new(scheduler, controller_shutdown);
                self.schedulers
                    .store(scheduling_kind.name(), Arc::clone(&wrapper));
                wrapper
            }
        };

        if wrapper.has_plugin(&type_config_name) {
            // Scheduler and plugin already running for this type config.
            return ReconciliationStatus::AllOk;
        }

        let federated_kind = type_config.federated_type().kind.clone();
        let fed_namespace_resource = match self.federated_namespace_api_resource() {
            Ok(resource) => resource,
            Err(err) => {
                error!(
                    plugin = %federated_kind,
                    kind = scheduling_kind.name(),
                    error = %err,
                    "Unable to start plugin: missing type config for namespaces"
                );
                return ReconciliationStatus::Error;
            }
        };

        info!(plugin = %federated_kind, kind = scheduling_kind.name(), "Starting scheduling plugin");
        if let Err(err) = wrapper
            .scheduler()
            .start_plugin(&type_config, &fed_namespace_resource)
            .await
        {
            error!(
                plugin = %federated_kind,
                kind = scheduling_kind.name(),
                error = %err,
                "Error starting scheduling plugin"
            );
            return ReconciliationStatus::Error;
        }
        wrapper.plugins.store(type_config_name, federated_kind);

        ReconciliationStatus::AllOk
    }

    /// Stops the plugin registered under the type config, and the whole
    /// preference controller when that leaves the plugin set empty.
    async fn stop_scheduler(&self, scheduling_kind: SchedulingKind, type_config_name: &str) {
        let Some(wrapper) = self.schedulers.get(scheduling_kind.name()) else {
            return;
        };

        if let Some(federated_kind) = wrapper.plugins.get(type_config_name) {
            info!(plugin = %federated_kind, kind = scheduling_kind.name(), "Stopping scheduling plugin");
            wrapper.scheduler().stop_plugin(&federated_kind).await;
            wrapper.plugins.delete(type_config_name);
        }

        if wrapper.plugins.size() == 0 {
            info!(kind = scheduling_kind.name(), "Stopping scheduling preference controller");
            wrapper.shutdown.cancel();
            self.schedulers.delete(scheduling_kind.name());
        }
    }

    /// Every plugin needs the federated namespace resource to compute
    /// placement scoping; it is read from the cached type config that
    /// governs namespaces.
    fn federated_namespace_api_resource(&self) -> anyhow::Result<ApiResource> {
        let qualified_name = QualifiedName::new(
            self.config.federation_namespace.clone(),
            NAMESPACE_TYPE_CONFIG_NAME,
        );
        let key = qualified_name.to_string();
        let cached = self
            .informer
            .store()
            .get_by_key(&key)
            .ok_or_else(|| anyhow!("Unable to find {key:?} in the informer cache"))?;
        let mut type_config = FederatedTypeConfig::from_object(&cached)
            .with_context(|| format!("Error decoding {key:?} from the informer cache"))?;
        type_config.set_defaults();
        Ok(type_config.federated_type().clone())
    }
}

async fn wait_for_cache_sync(
    informer: &dyn Informer,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    while !informer.has_synced() {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            _ = shutdown.cancelled() => return Err(anyhow!("shutdown before cache sync")),
        }
    }
    Ok(())
}
