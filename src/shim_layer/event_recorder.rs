// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::reconciler::io::{EventSeverity, ReconcileEvent};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// EventRecorder attaches human-readable events to reconciled objects.
/// Recording is best-effort: a failure is logged and never fails the pass.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, object_ref: &ObjectReference, event: &ReconcileEvent);
}

pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    pub fn new(client: Client, controller_name: &str) -> KubeEventRecorder {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("CONTROLLER_POD_NAME").ok(),
        };
        KubeEventRecorder {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, object_ref: &ObjectReference, event: &ReconcileEvent) {
        let ev = Event {
            type_: match event.severity {
                EventSeverity::Normal => EventType::Normal,
                EventSeverity::Warning => EventType::Warning,
            },
            reason: event.reason.clone(),
            note: Some(event.message.clone()),
            action: event.action.clone(),
            secondary: None,
        };
        if let Err(err) = self.recorder.publish(&ev, object_ref).await {
            warn!(reason = %event.reason, error = %err, "failed to publish event");
        }
    }
}

/// Keeps recorded events in memory, in recording order.
#[derive(Debug, Default)]
pub struct MemoryEventRecorder {
    events: Mutex<Vec<(ObjectReference, ReconcileEvent)>>,
}

impl MemoryEventRecorder {
    pub fn new() -> MemoryEventRecorder {
        MemoryEventRecorder::default()
    }

    pub fn events(&self) -> Vec<(ObjectReference, ReconcileEvent)> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|(_, event)| event.reason)
            .collect()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(&self, object_ref: &ObjectReference, event: &ReconcileEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((object_ref.clone(), event.clone()));
    }
}
