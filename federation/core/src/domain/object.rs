// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Unstructured resource objects.
//!
//! The controllers operate on resources of arbitrary kind, so payloads are
//! carried as raw JSON next to the typed metadata every API object shares.

use crate::domain::resource::{QualifiedName, MANAGED_LABEL, MANAGED_LABEL_VALUE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Group/version/kind triple identifying a resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// The `apiVersion` wire form: `group/version`, or bare `version` for
    /// the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// A discoverable API resource: GVK plus plural name and scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    /// Plural resource name, e.g. `deployments`.
    pub name: String,
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespaced: bool,
}

impl ApiResource {
    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind::new(self.group.clone(), self.version.clone(), self.kind.clone())
    }
}

/// Lowercase-plural name for a kind, e.g. `Deployment` -> `deployments`.
pub fn plural_name(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}

/// Reference to an owning object; the API server garbage-collects owned
/// objects when the owner disappears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

/// Metadata common to every API object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

/// An API object of arbitrary kind: typed metadata plus raw JSON content
/// (`spec`, `status`, and anything else the kind defines).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceObject {
    #[serde(flatten)]
    pub gvk: GroupVersionKind,
    pub meta: ResourceMeta,
    #[serde(default)]
    pub content: Value,
}

impl ResourceObject {
    pub fn new(gvk: GroupVersionKind, meta: ResourceMeta) -> Self {
        Self {
            gvk,
            meta,
            content: Value::Null,
        }
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.meta.namespace.clone(), self.meta.name.clone())
    }

    pub fn has_managed_label(&self) -> bool {
        self.meta
            .labels
            .get(MANAGED_LABEL)
            .is_some_and(|v| v == MANAGED_LABEL_VALUE)
    }

    pub fn set_managed_label(&mut self) {
        self.meta
            .labels
            .insert(MANAGED_LABEL.to_string(), MANAGED_LABEL_VALUE.to_string());
    }

    pub fn remove_managed_label(&mut self) {
        self.meta.labels.remove(MANAGED_LABEL);
    }

    pub fn is_pending_deletion(&self) -> bool {
        self.meta.deletion_timestamp.is_some()
    }

    /// Owner reference pointing at this object.
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.gvk.api_version(),
            kind: self.gvk.kind.clone(),
            name: self.meta.name.clone(),
            uid: self.meta.uid.clone(),
        }
    }

    /// Content lookup by JSON pointer, e.g. `/spec/template`.
    pub fn content_at(&self, pointer: &str) -> Option<&Value> {
        self.content.pointer(pointer)
    }
}

/// Content fingerprint: sha-256 over the canonical JSON form (object keys
/// sorted recursively so map ordering cannot perturb the hash).
pub fn content_fingerprint(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hash_value(value, &mut hasher);
    hex::encode(hasher.finalize())
}

fn hash_value(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            hasher.update(b"{");
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b":");
                hash_value(&map[key], hasher);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_value(item, hasher);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        other => hasher.update(other.to_string().as_bytes()),
    }
}
