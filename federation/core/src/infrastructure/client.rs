// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Generic typed client boundary.
//!
//! The controllers talk to the host API and to member-cluster APIs through
//! the same trait, parameterized by group/version/kind, namespace, and
//! name. Implementations live outside this crate; tests use in-memory
//! fakes.

use crate::domain::object::{GroupVersionKind, ResourceObject};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error taxonomy mirroring the API server's status reasons. The
/// controllers branch on these to decide retry versus terminal handling.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("resource not found")]
    NotFound,
    #[error("resource already exists")]
    AlreadyExists,
    #[error("optimistic concurrency conflict")]
    Conflict,
    #[error("forbidden")]
    Forbidden,
    #[error("invalid resource: {0}")]
    Invalid(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClientError::Forbidden)
    }
}

/// Generic client over unstructured resources.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceObject, ClientError>;

    /// Lists resources of the kind; an empty namespace means all
    /// namespaces (or a cluster-scoped kind).
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<Vec<ResourceObject>, ClientError>;

    async fn create(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError>;

    async fn update(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError>;

    /// Updates only the status subresource.
    async fn update_status(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError>;

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError>;

    /// Merge-patches the stored object with the given object's metadata
    /// and content.
    async fn patch(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError>;
}

/// Resolves the client bound to a member cluster. Returns `None` when the
/// cluster is unknown or its credentials are gone; the dispatcher surfaces
/// that as a failed operation rather than a panic.
pub trait ClusterClientAccessor: Send + Sync {
    fn client_for(&self, cluster_name: &str) -> Option<Arc<dyn ResourceClient>>;
}
