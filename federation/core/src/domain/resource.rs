// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Core resource identity types shared by every federation controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API group owning the federation custom resources.
pub const FEDERATION_GROUP: &str = "federation.aegis.dev";

/// Label marking a member-cluster resource as managed by the federation.
pub const MANAGED_LABEL: &str = "federation.aegis.dev/managed";
pub const MANAGED_LABEL_VALUE: &str = "true";

/// Kind name of the namespace target type.
pub const NAMESPACE_KIND: &str = "Namespace";

/// Name of the type config that governs namespace federation.
pub const NAMESPACE_TYPE_CONFIG_NAME: &str = "namespaces";

/// A (namespace, name) pair identifying any resource. The string form
/// `namespace/name` is the cache key used throughout the controllers;
/// cluster-scoped resources render as the bare name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// A cluster-scoped name with no namespace component.
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Outcome of a single reconcile pass. `Error` statuses are re-queued by
/// the owning worker rather than retried in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStatus {
    AllOk,
    Error,
}

/// Namespace in which the federated wrapper for a resource lives. The
/// wrapper of a cluster-scoped resource is stored in the federation
/// system namespace.
pub fn namespace_for_resource(event_namespace: &str, federation_namespace: &str) -> String {
    if event_namespace.is_empty() {
        federation_namespace.to_string()
    } else {
        event_namespace.to_string()
    }
}
