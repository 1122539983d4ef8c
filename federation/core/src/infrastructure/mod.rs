// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: external capability boundaries and shared
//! concurrency primitives.

pub mod client;
pub mod informer;
pub mod recorder;
pub mod registry;
pub mod worker;

pub use client::{ClientError, ClusterClientAccessor, ResourceClient};
pub use informer::{EnqueueHandler, Informer, InformerFactory, ObjectStore};
pub use recorder::{BroadcastEventRecorder, EventRecorder, EventType, ObjectEvent};
pub use registry::SafeMap;
pub use worker::{ReconcileHandler, ReconcileWorker};
