// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::{api_method::*, error::APIError};
use kube::api::DynamicObject;

// Request is what reconcile_core asks the shim layer to do next.
// Besides Kubernetes API requests, the reconciler can ask for an event
// to be recorded against the object it reconciles.
#[derive(Debug, Clone)]
pub enum Request {
    KRequest(KubeAPIRequest),
    EventRequest(ReconcileEvent),
}

#[derive(Debug, Clone)]
pub enum Response {
    KResponse(KubeAPIResponse),
    // Recording is best-effort, so there is nothing to report back.
    EventRecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// A human-readable event attached to the reconciled object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileEvent {
    pub severity: EventSeverity,
    pub reason: String,
    pub action: String,
    pub message: String,
}

impl ReconcileEvent {
    pub fn normal(reason: &str, action: &str, message: String) -> ReconcileEvent {
        ReconcileEvent {
            severity: EventSeverity::Normal,
            reason: reason.to_string(),
            action: action.to_string(),
            message,
        }
    }
}

// The helpers below pull the result of one kind of API call out of the
// response fed back to reconcile_core. Any other response yields None.

pub fn extract_get_resp(resp_o: Option<Response>) -> Option<Result<DynamicObject, APIError>> {
    match resp_o {
        Some(Response::KResponse(KubeAPIResponse::GetResponse(resp))) => Some(resp.res),
        _ => None,
    }
}

pub fn extract_create_resp(resp_o: Option<Response>) -> Option<Result<DynamicObject, APIError>> {
    match resp_o {
        Some(Response::KResponse(KubeAPIResponse::CreateResponse(resp))) => Some(resp.res),
        _ => None,
    }
}

pub fn extract_delete_resp(resp_o: Option<Response>) -> Option<Result<(), APIError>> {
    match resp_o {
        Some(Response::KResponse(KubeAPIResponse::DeleteResponse(resp))) => Some(resp.res),
        _ => None,
    }
}

pub fn extract_update_resp(resp_o: Option<Response>) -> Option<Result<DynamicObject, APIError>> {
    match resp_o {
        Some(Response::KResponse(KubeAPIResponse::UpdateResponse(resp))) => Some(resp.res),
        _ => None,
    }
}

pub fn extract_update_status_resp(resp_o: Option<Response>) -> Option<Result<DynamicObject, APIError>> {
    match resp_o {
        Some(Response::KResponse(KubeAPIResponse::UpdateStatusResponse(resp))) => Some(resp.res),
        _ => None,
    }
}
