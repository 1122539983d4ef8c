// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Federated resource accessor.
//!
//! Translates raw watch events on the federated type, the target type,
//! and the federated-namespace placement type into a validated, hydrated
//! [`FederatedResource`], or classifies them as "not federated" or
//! "possible orphan".

use crate::domain::config::ControllerConfig;
use crate::domain::object::{content_fingerprint, ApiResource, ResourceObject};
use crate::domain::resource::{namespace_for_resource, QualifiedName, NAMESPACE_KIND};
use crate::domain::typeconfig::FederatedTypeConfig;
use crate::domain::version::VersionedResource;
use crate::application::version_manager::VersionManager;
use crate::infrastructure::client::ResourceClient;
use crate::infrastructure::informer::{EnqueueHandler, Informer, InformerFactory};
use crate::infrastructure::recorder::{EventRecorder, EventType};
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A hydrated logical federated resource: the stored wrapper object plus
/// the context needed to reconcile it. Constructed on demand per
/// reconcile and owned exclusively by the caller; never cached.
pub struct FederatedResource {
    type_config: FederatedTypeConfig,
    target_is_namespace: bool,
    federated_kind: String,
    federated_name: QualifiedName,
    target_name: QualifiedName,
    object: ResourceObject,
    /// Only present for namespace-shaped targets; supplies the template
    /// and the deletion/host context.
    namespace: Option<ResourceObject>,
    /// Placement constraint inherited from the containing federated
    /// namespace, when the target type is namespaced.
    fed_namespace: Option<ResourceObject>,
    version_manager: Arc<VersionManager>,
}

impl FederatedResource {
    pub fn federated_kind(&self) -> &str {
        &self.federated_kind
    }

    pub fn target_kind(&self) -> &str {
        &self.type_config.target_type().kind
    }

    pub fn target_name(&self) -> &QualifiedName {
        &self.target_name
    }

    pub fn object(&self) -> &ResourceObject {
        &self.object
    }

    pub fn namespace_object(&self) -> Option<&ResourceObject> {
        self.namespace.as_ref()
    }

    pub fn fed_namespace_object(&self) -> Option<&ResourceObject> {
        self.fed_namespace.as_ref()
    }

    /// Per-cluster versions recorded for the current content; empty when
    /// the recorded fingerprints are stale.
    pub fn version_map(&self) -> anyhow::Result<HashMap<String, String>> {
        self.version_manager.get(self)
    }

    pub async fn update_versions(
        &self,
        selected_clusters: &[String],
        version_map: HashMap<String, String>,
    ) -> anyhow::Result<()> {
        self.version_manager
            .update(self, selected_clusters, version_map)
            .await
    }

    pub fn delete_version(&self) {
        self.version_manager.delete(&self.federated_name);
    }

    /// The content propagated to member clusters. For namespace-shaped
    /// targets the containing namespace is the template source.
    fn template_content(&self) -> Value {
        if self.target_is_namespace {
            match &self.namespace {
                Some(namespace) => serde_json::json!({
                    "labels": namespace.meta.labels,
                    "content": namespace.content,
                }),
                None => Value::Null,
            }
        } else {
            self.object
                .content_at("/spec/template")
                .cloned()
                .unwrap_or(Value::Null)
        }
    }
}

impl VersionedResource for FederatedResource {
    fn federated_name(&self) -> QualifiedName {
        self.federated_name.clone()
    }

    fn object(&self) -> &ResourceObject {
        &self.object
    }

    fn template_version(&self) -> anyhow::Result<String> {
        Ok(content_fingerprint(&self.template_content()))
    }

    fn override_version(&self) -> anyhow::Result<String> {
        let overrides = self
            .object
            .content_at("/spec/overrides")
            .cloned()
            .unwrap_or(Value::Null);
        Ok(content_fingerprint(&overrides))
    }
}

/// Derives the target and federated names for an event source.
///
/// Most federated resources share their target's name and differ only in
/// the wrapper namespace. A federated namespace is namespaced inside
/// itself (`foo/foo`): an event sourced from the bare namespace carries no
/// namespace component, one sourced from the federated wrapper does, and
/// the two must be normalized before any cache lookup.
fn resolve_names(
    event_source: &QualifiedName,
    target_is_namespace: bool,
    federation_namespace: &str,
) -> (QualifiedName, QualifiedName) {
    let mut target_name = event_source.clone();
    let mut federated_name = QualifiedName::new(
        namespace_for_resource(&event_source.namespace, federation_namespace),
        event_source.name.clone(),
    );

    if target_is_namespace {
        let event_source_is_target = event_source.namespace.is_empty();
        if event_source_is_target {
            federated_name.namespace = federated_name.name.clone();
        } else {
            target_name.namespace.clear();
        }
    }

    (target_name, federated_name)
}

/// Resolves watch events to logical federated resources.
pub struct FederatedResourceAccessor {
    type_config: FederatedTypeConfig,
    target_is_namespace: bool,
    federation_namespace: String,

    federated_informer: Arc<dyn Informer>,
    /// Sources the namespaces serving as templates for federated
    /// namespaces; only initialized for namespace-shaped targets.
    namespace_informer: Option<Arc<dyn Informer>>,
    /// Sources the federated namespaces constraining placement; only
    /// initialized for namespaced target types.
    fed_namespace_informer: Option<Arc<dyn Informer>>,

    version_manager: Arc<VersionManager>,
    recorder: Arc<dyn EventRecorder>,
}

impl FederatedResourceAccessor {
    pub fn new(
        config: &ControllerConfig,
        type_config: FederatedTypeConfig,
        fed_namespace_resource: Option<&ApiResource>,
        informers: &dyn InformerFactory,
        client: Arc<dyn ResourceClient>,
        enqueue: EnqueueHandler,
        recorder: Arc<dyn EventRecorder>,
    ) -> anyhow::Result<Self> {
        let target_is_namespace = type_config.target_type().kind == NAMESPACE_KIND;

        let federated_informer = informers
            .informer(
                type_config.federated_type(),
                &config.target_namespace,
                Arc::clone(&enqueue),
            )
            .context("Failed to start an informer for the federated type")?;

        let namespace_informer = if target_is_namespace {
            let informer = informers
                .informer(
                    type_config.target_type(),
                    &config.target_namespace,
                    Arc::clone(&enqueue),
                )
                .context("Failed to start an informer for namespaces")?;
            Some(informer)
        } else {
            None
        };

        let fed_namespace_informer = if type_config.namespaced() {
            let resource = fed_namespace_resource
                .context("A federated namespace resource is required for namespaced kinds")?;
            // A change to a federated namespace affects placement for
            // every resource it contains, so all of them are re-queued.
            let federated_store = federated_informer.store();
            let fan_out: EnqueueHandler = {
                let enqueue = Arc::clone(&enqueue);
                Arc::new(move |fed_namespace_obj: &ResourceObject| {
                    let namespace = fed_namespace_obj.qualified_name().namespace;
                    for obj in federated_store.list() {
                        if obj.meta.namespace == namespace {
                            enqueue(&obj);
                        }
                    }
                })
            };
            let informer = informers
                .informer(resource, &config.target_namespace, fan_out)
                .context("Failed to start an informer for federated namespaces")?;
            Some(informer)
        } else {
            None
        };

        let version_manager = Arc::new(VersionManager::new(
            client,
            type_config.federated_namespaced(),
            type_config.federated_type().kind.clone(),
            type_config.target_type().kind.clone(),
            config.target_namespace.clone(),
        ));

        Ok(Self {
            type_config,
            target_is_namespace,
            federation_namespace: config.federation_namespace.clone(),
            federated_informer,
            namespace_informer,
            fed_namespace_informer,
            version_manager,
            recorder,
        })
    }

    /// Starts the version-manager sync and every informer; non-blocking.
    pub fn run(&self, shutdown: &CancellationToken) {
        let version_manager = Arc::clone(&self.version_manager);
        let sync_shutdown = shutdown.clone();
        tokio::spawn(async move {
            version_manager.sync(sync_shutdown).await;
        });

        self.federated_informer.run(shutdown.clone());
        if let Some(informer) = &self.namespace_informer {
            informer.run(shutdown.clone());
        }
        if let Some(informer) = &self.fed_namespace_informer {
            informer.run(shutdown.clone());
        }
    }

    /// Ready only once every watch has delivered its initial list and the
    /// propagation history is loaded; anything earlier would make the
    /// first reconcile after a restart re-push every resource.
    pub fn has_synced(&self) -> bool {
        let kind = &self.type_config.federated_type().kind;
        if !self.version_manager.has_synced() {
            debug!(kind = %kind, "Version manager not synced");
            return false;
        }
        if !self.federated_informer.has_synced() {
            debug!(kind = %kind, "Informer for the federated type not synced");
            return false;
        }
        if let Some(informer) = &self.namespace_informer {
            if !informer.has_synced() {
                debug!(kind = %kind, "Namespace informer not synced");
                return false;
            }
        }
        if let Some(informer) = &self.fed_namespace_informer {
            if !informer.has_synced() {
                debug!(kind = %kind, "Federated namespace informer not synced");
                return false;
            }
        }
        true
    }

    /// Resolves an event source to a hydrated federated resource.
    ///
    /// Returns `(None, possible_orphan)` when no federated resource
    /// exists: the event may then point at an orphaned target that still
    /// carries the managed label. The orphan signal stays conservative:
    /// false only when the event is provably sourced from the federated
    /// namespace watch.
    pub fn federated_resource(
        &self,
        event_source: &QualifiedName,
    ) -> anyhow::Result<(Option<FederatedResource>, bool)> {
        if self.target_is_namespace && self.is_system_namespace(&event_source.name) {
            debug!(namespace = %event_source.name, "Ignoring system namespace");
            return Ok((None, false));
        }

        let (target_name, federated_name) = resolve_names(
            event_source,
            self.target_is_namespace,
            &self.federation_namespace,
        );

        let resource = self
            .federated_informer
            .store()
            .get_by_key(&federated_name.to_string());
        let Some(resource) = resource else {
            // If the target is a namespace and the event source carries a
            // namespace, the source is guaranteed to be the federated
            // namespace wrapper rather than an orphan candidate.
            let source_is_fed_namespace =
                self.target_is_namespace && !event_source.namespace.is_empty();
            return Ok((None, !source_is_fed_namespace));
        };

        let mut namespace = None;
        if self.target_is_namespace {
            if federated_name.namespace != federated_name.name {
                // Only valid for propagation when self-namespaced.
                self.recorder.event(
                    &resource,
                    EventType::Warning,
                    "InvalidName",
                    "The name of a federated namespace must match the name of its containing namespace.",
                );
                return Ok((None, false));
            }
            namespace = self
                .namespace_informer
                .as_ref()
                .and_then(|informer| informer.store().get_by_key(&target_name.to_string()));
            if namespace.is_none() {
                // The namespace containing the federated namespace was
                // deleted.
                return Ok((None, false));
            }
        }

        let mut fed_namespace = None;
        if self.type_config.namespaced() {
            let fed_namespace_name = QualifiedName::new(
                federated_name.namespace.clone(),
                federated_name.namespace.clone(),
            );
            fed_namespace = self
                .fed_namespace_informer
                .as_ref()
                .and_then(|informer| informer.store().get_by_key(&fed_namespace_name.to_string()));
            // A missing federated namespace is not an error: it means the
            // resources in member clusters will be removed.
        }

        Ok((
            Some(FederatedResource {
                federated_kind: self.type_config.federated_type().kind.clone(),
                type_config: self.type_config.clone(),
                target_is_namespace: self.target_is_namespace,
                federated_name,
                target_name,
                object: resource,
                namespace,
                fed_namespace,
                version_manager: Arc::clone(&self.version_manager),
            }),
            false,
        ))
    }

    /// Visits a snapshot of the federated-type cache; used for periodic
    /// full-resync sweeps independent of event-driven reconciliation.
    pub fn visit_federated_resources(&self, mut visit: impl FnMut(&ResourceObject)) {
        for obj in self.federated_informer.store().list() {
            visit(&obj);
        }
    }

    fn is_system_namespace(&self, namespace: &str) -> bool {
        matches!(namespace, "kube-system" | "kube-public" | "default")
            || namespace == self.federation_namespace
    }
}
