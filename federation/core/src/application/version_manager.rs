// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Propagated version manager.
//!
//! Keeps the in-memory record of which template/override content was last
//! pushed to which member clusters, synchronized from and written back to
//! the durable store. The sync engine consults it to compute diffs instead
//! of blindly re-pushing every resource on every reconcile.
//!
//! The cache lock is never held across a network call; the pending record
//! is cloned out under the lock and written afterwards. Callers serialize
//! reconciles per resource, so there is at most one concurrent write per
//! version record.

use crate::domain::object::ResourceObject;
use crate::domain::resource::QualifiedName;
use crate::domain::version::{
    map_to_cluster_versions, propagated_version_name, propagated_version_prefix, version_gvk,
    ClusterObjectVersion, PropagatedVersion, PropagatedVersionStatus, VersionedResource,
};
use crate::infrastructure::client::ResourceClient;
use anyhow::{anyhow, Context};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const LIST_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct VersionCache {
    versions: HashMap<String, PropagatedVersion>,
    has_synced: bool,
}

pub struct VersionManager {
    target_kind: String,
    federated_kind: String,
    /// Namespace to source propagated versions from; empty for
    /// cluster-scoped version records.
    namespace: String,
    namespaced: bool,
    client: Arc<dyn ResourceClient>,
    state: RwLock<VersionCache>,
}

impl VersionManager {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        namespaced: bool,
        federated_kind: impl Into<String>,
        target_kind: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            target_kind: target_kind.into(),
            federated_kind: federated_kind.into(),
            namespace: namespace.into(),
            namespaced,
            client,
            state: RwLock::new(VersionCache::default()),
        }
    }

    /// Retrieves propagated versions from the durable store and loads them
    /// into memory. Gates all other use via `has_synced`.
    pub async fn sync(&self, shutdown: CancellationToken) {
        let Some(items) = self.list(&shutdown).await else {
            return;
        };
        self.load(items, &shutdown);
    }

    /// Whether the in-memory state has been synced with the store.
    pub fn has_synced(&self) -> bool {
        self.state.read().has_synced
    }

    /// Cluster-version map for the resource. Valid cached evidence is
    /// returned only when both content fingerprints still match; any
    /// mismatch yields an empty map, forcing full re-propagation.
    pub fn get(&self, resource: &dyn VersionedResource) -> anyhow::Result<HashMap<String, String>> {
        let mut version_map = HashMap::new();

        let qualified_name = self.version_qualified_name(&resource.federated_name());
        let stored = { self.state.read().versions.get(&qualified_name.to_string()).cloned() };
        let Some(stored) = stored else {
            return Ok(version_map);
        };

        let template_version = resource
            .template_version()
            .context("Failed to determine template version")?;
        let override_version = resource
            .override_version()
            .context("Failed to determine override version")?;
        if template_version == stored.status.template_version
            && override_version == stored.status.override_version
        {
            for cluster_version in &stored.status.cluster_versions {
                version_map.insert(
                    cluster_version.cluster_name.clone(),
                    cluster_version.version.clone(),
                );
            }
        }

        Ok(version_map)
    }

    /// Records the propagated version for the resource. Skips the durable
    /// write when the merged result is equivalent to the stored record.
    pub async fn update(
        &self,
        resource: &dyn VersionedResource,
        selected_clusters: &[String],
        version_map: HashMap<String, String>,
    ) -> anyhow::Result<()> {
        let template_version = resource
            .template_version()
            .context("Failed to determine template version")?;
        let override_version = resource
            .override_version()
            .context("Failed to determine override version")?;
        let qualified_name = self.version_qualified_name(&resource.federated_name());
        let key = qualified_name.to_string();

        let pending = {
            let mut state = self.state.write();
            match state.versions.get_mut(&key) {
                Some(existing) => {
                    let old_status = existing.status.clone();
                    // The existing cluster versions are still valid only if
                    // the template and override fingerprints match.
                    let old_versions = if old_status.template_version == template_version
                        && old_status.override_version == override_version
                    {
                        old_status.cluster_versions.clone()
                    } else {
                        Vec::new()
                    };
                    let status = PropagatedVersionStatus {
                        template_version,
                        override_version,
                        cluster_versions: update_cluster_versions(
                            old_versions,
                            version_map,
                            selected_clusters,
                        ),
                    };
                    if old_status == status {
                        debug!(key = %qualified_name, "No version update necessary");
                        None
                    } else {
                        existing.status = status;
                        Some(existing.clone())
                    }
                }
                None => {
                    let status = PropagatedVersionStatus {
                        template_version,
                        override_version,
                        cluster_versions: map_to_cluster_versions(&version_map),
                    };
                    let version = PropagatedVersion::new(
                        qualified_name.clone(),
                        resource.object().owner_reference(),
                        status,
                        self.namespaced,
                    );
                    state.versions.insert(key.clone(), version.clone());
                    Some(version)
                }
            }
        };
        // The lock is released here; the durable write must never block
        // unrelated reads and writes on the cache.

        match pending {
            None => Ok(()),
            Some(version) => self.write_version(version, &qualified_name).await,
        }
    }

    /// Evicts the in-memory record. The durable record carries an owner
    /// reference to the federated resource and is garbage-collected with
    /// it.
    pub fn delete(&self, qualified_name: &QualifiedName) {
        let version_qualified_name = self.version_qualified_name(qualified_name);
        self.state
            .write()
            .versions
            .remove(&version_qualified_name.to_string());
    }

    async fn list(&self, shutdown: &CancellationToken) -> Option<Vec<ResourceObject>> {
        let gvk = version_gvk(self.namespaced);
        loop {
            let attempt = tokio::select! {
                result = self.client.list(&gvk, &self.namespace) => result,
                _ = shutdown.cancelled() => {
                    debug!(kind = %self.federated_kind, "Halting version manager list due to cancellation");
                    return None;
                }
            };
            match attempt {
                Ok(items) => return Some(items),
                Err(err) => {
                    error!(
                        kind = %self.federated_kind,
                        error = %err,
                        "Failed to list propagated versions"
                    );
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(LIST_RETRY_INTERVAL) => {}
                _ = shutdown.cancelled() => {
                    debug!(kind = %self.federated_kind, "Halting version manager list due to cancellation");
                    return None;
                }
            }
        }
    }

    fn load(&self, items: Vec<ResourceObject>, shutdown: &CancellationToken) -> bool {
        let prefix = propagated_version_prefix(&self.target_kind);
        let mut loaded = HashMap::new();
        for obj in items {
            if shutdown.is_cancelled() {
                debug!(kind = %self.federated_kind, "Halting version manager load due to cancellation");
                return false;
            }
            // Ignore propagated versions recorded for other target kinds.
            if !obj.meta.name.starts_with(&prefix) {
                continue;
            }
            match PropagatedVersion::from_object(&obj) {
                Ok(version) => {
                    loaded.insert(version.qualified_name().to_string(), version);
                }
                Err(err) => {
                    error!(
                        name = %obj.meta.name,
                        error = %err,
                        "Failed to understand list result for propagated versions"
                    );
                }
            }
        }

        let mut state = self.state.write();
        state.versions.extend(loaded);
        state.has_synced = true;
        debug!(kind = %self.federated_kind, "Version manager synced");
        true
    }

    /// Derives the version record name from a federated resource name.
    fn version_qualified_name(&self, qualified_name: &QualifiedName) -> QualifiedName {
        QualifiedName::new(
            qualified_name.namespace.clone(),
            propagated_version_name(&self.target_kind, &qualified_name.name),
        )
    }

    /// Serializes the version record to the durable store: create when no
    /// resource version is known, update-status otherwise, refreshing on
    /// concurrent-writer signals, bounded by an overall deadline.
    async fn write_version(
        &self,
        version: PropagatedVersion,
        qualified_name: &QualifiedName,
    ) -> anyhow::Result<()> {
        let key = qualified_name.to_string();
        let type_name = PropagatedVersion::kind(self.namespaced);
        let mut resource_version = version.meta.resource_version.clone();
        let mut refresh_version = false;
        let deadline = Instant::now() + WRITE_TIMEOUT;

        loop {
            if refresh_version {
                // Written to the store by another process after our last
                // write; pick up its resource version.
                match self.resource_version_from_api(qualified_name).await {
                    Ok(fresh) => {
                        resource_version = fresh;
                        refresh_version = false;
                    }
                    Err(err) => {
                        error!(key = %key, error = %err, "Failed to refresh the version record's resource version");
                    }
                }
            }

            if !refresh_version {
                if resource_version.is_empty() {
                    let mut created = version.clone();
                    created.meta.resource_version.clear();
                    debug!(key = %key, "Creating {type_name}");
                    match self.client.create(&created.to_object()).await {
                        Err(err) if err.is_already_exists() => {
                            debug!(key = %key, "{type_name} was created by another process, refreshing");
                            refresh_version = true;
                        }
                        Err(err) if err.is_forbidden() => {
                            // Likely the containing namespace is being
                            // deleted; retrying cannot succeed.
                            return Err(anyhow!(err)
                                .context(format!("Failed to create {type_name} {key:?}")));
                        }
                        Err(err) => {
                            error!(key = %key, error = %err, "Failed to create {type_name}");
                        }
                        Ok(result) => {
                            resource_version = result.meta.resource_version;
                        }
                    }
                }

                if !refresh_version && !resource_version.is_empty() {
                    let mut updated = version.clone();
                    updated.meta.resource_version = resource_version.clone();
                    debug!(key = %key, "Updating the status of {type_name}");
                    match self.client.update_status(&updated.to_object()).await {
                        Err(err) if err.is_conflict() => {
                            debug!(key = %key, "{type_name} was updated by another process, refreshing");
                            refresh_version = true;
                        }
                        Err(err) if err.is_not_found() => {
                            debug!(key = %key, "{type_name} was deleted by another process, re-creating");
                            resource_version.clear();
                        }
                        Err(err) if err.is_forbidden() => {
                            return Err(anyhow!(err)
                                .context(format!("Failed to update the status of {type_name} {key:?}")));
                        }
                        Err(err) => {
                            error!(key = %key, error = %err, "Failed to update the status of {type_name}");
                        }
                        Ok(result) => {
                            // Record the fresh resource version for the next
                            // write of this record.
                            let mut state = self.state.write();
                            if let Some(cached) = state.versions.get_mut(&key) {
                                cached.meta.resource_version = result.meta.resource_version;
                            }
                            return Ok(());
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "timed out writing the version record for {type_name} {key:?}"
                ));
            }
            tokio::time::sleep(WRITE_RETRY_INTERVAL).await;
        }
    }

    async fn resource_version_from_api(
        &self,
        qualified_name: &QualifiedName,
    ) -> anyhow::Result<String> {
        let obj = self
            .client
            .get(
                &version_gvk(self.namespaced),
                &qualified_name.namespace,
                &qualified_name.name,
            )
            .await?;
        Ok(obj.meta.resource_version)
    }
}

/// Merges new cluster versions with the stored list: new entries win,
/// selected clusters absent from the new map retain their previous value,
/// clusters no longer selected are dropped.
fn update_cluster_versions(
    old_versions: Vec<ClusterObjectVersion>,
    mut new_versions: HashMap<String, String>,
    selected_clusters: &[String],
) -> Vec<ClusterObjectVersion> {
    let selected: HashSet<&str> = selected_clusters.iter().map(String::as_str).collect();
    for old_version in &old_versions {
        if !selected.contains(old_version.cluster_name.as_str()) {
            continue;
        }
        new_versions
            .entry(old_version.cluster_name.clone())
            .or_insert_with(|| old_version.version.clone());
    }
    map_to_cluster_versions(&new_versions)
}
