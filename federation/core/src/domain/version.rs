// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Propagated version records.
//!
//! A propagated version is the durable evidence of what template/override
//! content was last pushed to which member clusters. The cluster-version
//! list is only meaningful while both content fingerprints still match the
//! federated resource, which is what lets the sync engine distinguish
//! convergence from staleness without a consistency protocol.

use crate::domain::object::{
    ApiResource, GroupVersionKind, OwnerReference, ResourceMeta, ResourceObject,
};
use crate::domain::resource::{QualifiedName, FEDERATION_GROUP};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const PROPAGATED_VERSION_KIND: &str = "PropagatedVersion";
pub const CLUSTER_PROPAGATED_VERSION_KIND: &str = "ClusterPropagatedVersion";

/// Version observed for the resource in one member cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterObjectVersion {
    pub cluster_name: String,
    pub version: String,
}

/// Status payload of a propagated version record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagatedVersionStatus {
    #[serde(default)]
    pub template_version: String,
    #[serde(default)]
    pub override_version: String,
    /// Ordered by cluster name.
    #[serde(default)]
    pub cluster_versions: Vec<ClusterObjectVersion>,
}

/// A propagated version record, namespaced or cluster-scoped depending on
/// the federated type it tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedVersion {
    pub meta: ResourceMeta,
    pub status: PropagatedVersionStatus,
    pub namespaced: bool,
}

#[derive(Debug, Error)]
pub enum VersionDecodeError {
    #[error("unexpected kind {0:?} for a propagated version")]
    UnexpectedKind(String),
    #[error("malformed status payload: {0}")]
    MalformedStatus(#[from] serde_json::Error),
}

impl PropagatedVersion {
    pub fn new(
        qualified_name: QualifiedName,
        owner: OwnerReference,
        status: PropagatedVersionStatus,
        namespaced: bool,
    ) -> Self {
        Self {
            meta: ResourceMeta {
                name: qualified_name.name,
                namespace: qualified_name.namespace,
                owner_references: vec![owner],
                ..Default::default()
            },
            status,
            namespaced,
        }
    }

    pub fn kind(namespaced: bool) -> &'static str {
        if namespaced {
            PROPAGATED_VERSION_KIND
        } else {
            CLUSTER_PROPAGATED_VERSION_KIND
        }
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.meta.namespace.clone(), self.meta.name.clone())
    }

    pub fn to_object(&self) -> ResourceObject {
        let mut obj = ResourceObject::new(version_gvk(self.namespaced), self.meta.clone());
        obj.content = serde_json::json!({
            "status": self.status,
        });
        obj
    }

    pub fn from_object(obj: &ResourceObject) -> Result<Self, VersionDecodeError> {
        let namespaced = match obj.gvk.kind.as_str() {
            PROPAGATED_VERSION_KIND => true,
            CLUSTER_PROPAGATED_VERSION_KIND => false,
            other => return Err(VersionDecodeError::UnexpectedKind(other.to_string())),
        };
        let status = match obj.content_at("/status") {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => PropagatedVersionStatus::default(),
        };
        Ok(Self {
            meta: obj.meta.clone(),
            status,
            namespaced,
        })
    }
}

pub fn version_gvk(namespaced: bool) -> GroupVersionKind {
    GroupVersionKind::new(FEDERATION_GROUP, "v1alpha1", PropagatedVersion::kind(namespaced))
}

pub fn version_api_resource(namespaced: bool) -> ApiResource {
    ApiResource {
        name: crate::domain::object::plural_name(PropagatedVersion::kind(namespaced)),
        group: FEDERATION_GROUP.to_string(),
        version: "v1alpha1".to_string(),
        kind: PropagatedVersion::kind(namespaced).to_string(),
        namespaced,
    }
}

/// Name of the version record tracking `resource_name` for `target_kind`,
/// e.g. `deployment-web`.
pub fn propagated_version_name(target_kind: &str, resource_name: &str) -> String {
    format!("{}-{}", target_kind.to_lowercase(), resource_name)
}

/// Name prefix shared by all version records for a target kind.
pub fn propagated_version_prefix(target_kind: &str) -> String {
    format!("{}-", target_kind.to_lowercase())
}

pub fn sort_cluster_versions(versions: &mut [ClusterObjectVersion]) {
    versions.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
}

/// Converts a cluster -> version map into a sorted list. An empty version
/// indicates deletion and is dropped.
pub fn map_to_cluster_versions(version_map: &HashMap<String, String>) -> Vec<ClusterObjectVersion> {
    let mut cluster_versions: Vec<ClusterObjectVersion> = version_map
        .iter()
        .filter(|(_, version)| !version.is_empty())
        .map(|(cluster_name, version)| ClusterObjectVersion {
            cluster_name: cluster_name.clone(),
            version: version.clone(),
        })
        .collect();
    sort_cluster_versions(&mut cluster_versions);
    cluster_versions
}

/// A resource whose propagation state can be tracked by the version
/// manager.
pub trait VersionedResource: Send + Sync {
    fn federated_name(&self) -> QualifiedName;
    fn object(&self) -> &ResourceObject;
    fn template_version(&self) -> anyhow::Result<String>;
    fn override_version(&self) -> anyhow::Result<String>;
}
