// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event recorder.
//!
//! Validation rejections and other operator-facing conditions surface as
//! events against the affected object rather than as process errors. The
//! broadcast implementation fans events out to any number of subscribers
//! (an API event sink, tests, log observers).

use crate::domain::object::ResourceObject;
use crate::domain::resource::QualifiedName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Normal,
    Warning,
}

/// A human-readable event recorded against one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub object: QualifiedName,
    pub kind: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

pub trait EventRecorder: Send + Sync {
    fn event(&self, obj: &ResourceObject, event_type: EventType, reason: &str, message: &str);
}

/// Broadcast-channel recorder. Events are dropped when no subscriber is
/// listening, which is fine: events are advisory, never load-bearing.
#[derive(Clone)]
pub struct BroadcastEventRecorder {
    sender: Arc<broadcast::Sender<ObjectEvent>>,
}

impl BroadcastEventRecorder {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObjectEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventRecorder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventRecorder for BroadcastEventRecorder {
    fn event(&self, obj: &ResourceObject, event_type: EventType, reason: &str, message: &str) {
        let event = ObjectEvent {
            object: obj.qualified_name(),
            kind: obj.gvk.kind.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        };
        debug!(object = %event.object, kind = %event.kind, reason, "Recording event");
        let _ = self.sender.send(event);
    }
}
