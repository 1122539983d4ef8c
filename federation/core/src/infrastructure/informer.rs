// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Watch/informer boundary.
//!
//! An informer delivers an initial list plus an ongoing stream of
//! add/update/delete notifications for one resource type, maintains a
//! cache of the current state, and exposes a "has the initial list
//! completed" signal. The watch machinery itself is external to this
//! crate; the controllers only consume these traits.

use crate::domain::object::{ApiResource, ResourceObject};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Read access to an informer's cache.
pub trait ObjectStore: Send + Sync {
    /// Lookup by `namespace/name` key (bare name for cluster-scoped
    /// resources).
    fn get_by_key(&self, key: &str) -> Option<ResourceObject>;

    /// Snapshot of every cached object.
    fn list(&self) -> Vec<ResourceObject>;
}

/// A running watch over one resource type.
pub trait Informer: Send + Sync {
    fn store(&self) -> Arc<dyn ObjectStore>;

    /// Whether the initial list has been delivered to the cache.
    fn has_synced(&self) -> bool;

    /// Starts the watch loop; non-blocking. The loop stops when the token
    /// is cancelled.
    fn run(&self, shutdown: CancellationToken);
}

/// Callback invoked for every add/update/delete notification.
pub type EnqueueHandler = Arc<dyn Fn(&ResourceObject) + Send + Sync>;

/// Constructs informers for arbitrary resource types. A factory error is
/// a startup failure: the owning controller does not come up without its
/// watches.
pub trait InformerFactory: Send + Sync {
    fn informer(
        &self,
        resource: &ApiResource,
        namespace: &str,
        enqueue: EnqueueHandler,
    ) -> anyhow::Result<Arc<dyn Informer>>;
}
