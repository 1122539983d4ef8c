// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Controller configuration shared by the federation controllers.

use serde::Deserialize;

/// Scope and namespace settings for a controller instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Namespace hosting the federation control plane and its
    /// configuration objects.
    pub federation_namespace: String,
    /// Namespace to which reconciliation is restricted; empty means all
    /// namespaces.
    pub target_namespace: String,
    /// Whether the control plane is restricted to a single namespace.
    pub limited_scope: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            federation_namespace: "federation-system".to_string(),
            target_namespace: String::new(),
            limited_scope: false,
        }
    }
}
