// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Federation type configuration.
//!
//! A `FederatedTypeConfig` describes, per federated kind, which target type
//! is realized in member clusters and whether propagation is currently
//! enabled. The objects are managed externally (CRD registration is out of
//! scope) and consumed here from informer caches.

use crate::domain::object::{plural_name, ApiResource, ResourceMeta, ResourceObject};
use crate::domain::resource::QualifiedName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API group under which federated wrapper types are registered.
pub const FEDERATED_TYPES_GROUP: &str = "types.federation.aegis.dev";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationMode {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfigSpec {
    pub target_type: ApiResource,
    pub federated_type: ApiResource,
    #[serde(default)]
    pub propagation: PropagationMode,
}

/// Typed view of a stored FederatedTypeConfig object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedTypeConfig {
    pub meta: ResourceMeta,
    pub spec: TypeConfigSpec,
}

#[derive(Debug, Error)]
#[error("malformed FederatedTypeConfig {name:?}: {source}")]
pub struct TypeConfigDecodeError {
    pub name: String,
    #[source]
    pub source: serde_json::Error,
}

impl FederatedTypeConfig {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.meta.namespace.clone(), self.meta.name.clone())
    }

    pub fn target_type(&self) -> &ApiResource {
        &self.spec.target_type
    }

    pub fn federated_type(&self) -> &ApiResource {
        &self.spec.federated_type
    }

    /// Whether the target type is namespaced.
    pub fn namespaced(&self) -> bool {
        self.spec.target_type.namespaced
    }

    pub fn federated_namespaced(&self) -> bool {
        self.spec.federated_type.namespaced
    }

    pub fn propagation_enabled(&self) -> bool {
        self.spec.propagation == PropagationMode::Enabled
    }

    pub fn pending_deletion(&self) -> bool {
        self.meta.deletion_timestamp.is_some()
    }

    /// Fills in the federated type's plural name and group when the stored
    /// object omits them.
    pub fn set_defaults(&mut self) {
        let federated = &mut self.spec.federated_type;
        if federated.name.is_empty() {
            federated.name = plural_name(&federated.kind);
        }
        if federated.group.is_empty() {
            federated.group = FEDERATED_TYPES_GROUP.to_string();
        }
    }

    /// Decodes the typed view from an unstructured informer-cache object.
    pub fn from_object(obj: &ResourceObject) -> Result<Self, TypeConfigDecodeError> {
        let spec_value = obj.content_at("/spec").cloned().unwrap_or(serde_json::Value::Null);
        let spec = serde_json::from_value(spec_value).map_err(|source| TypeConfigDecodeError {
            name: obj.meta.name.clone(),
            source,
        })?;
        Ok(Self {
            meta: obj.meta.clone(),
            spec,
        })
    }

    /// The API resource describing FederatedTypeConfig objects themselves.
    pub fn api_resource() -> ApiResource {
        ApiResource {
            name: "federatedtypeconfigs".to_string(),
            group: crate::domain::resource::FEDERATION_GROUP.to_string(),
            version: "v1beta1".to_string(),
            kind: "FederatedTypeConfig".to_string(),
            namespaced: true,
        }
    }
}
