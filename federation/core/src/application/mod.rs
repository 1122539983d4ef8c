// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: the reconciliation engine's services.

pub mod accessor;
pub mod dispatch;
pub mod scheduling;
pub mod version_manager;

pub use accessor::{FederatedResource, FederatedResourceAccessor};
pub use dispatch::{CheckUnmanagedDispatcher, ClusterOperationError, UnmanagedDispatcher};
pub use scheduling::{Scheduler, SchedulerFactory, SchedulerWrapper, SchedulingKind, SchedulingManager};
pub use version_manager::VersionManager;
