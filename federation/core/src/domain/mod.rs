// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: value types and invariants, no I/O.

pub mod config;
pub mod object;
pub mod resource;
pub mod typeconfig;
pub mod version;

pub use config::ControllerConfig;
pub use object::{ApiResource, GroupVersionKind, OwnerReference, ResourceMeta, ResourceObject};
pub use resource::{QualifiedName, ReconciliationStatus};
pub use typeconfig::FederatedTypeConfig;
pub use version::{ClusterObjectVersion, PropagatedVersion, PropagatedVersionStatus, VersionedResource};
