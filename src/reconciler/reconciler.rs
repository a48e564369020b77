// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::io::{Request, Response};
use thiserror::Error;

// Reconciler is the interface between a controller's reconcile logic and the shim layer.
//
// reconcile_core is a pure step function: it takes the reconciled object, the response
// to the request it issued in the previous step (if any) and its local state, and returns
// the next local state together with at most one request for the shim layer to execute.
// The shim layer starts from reconcile_init_state and keeps calling reconcile_core until
// reconcile_done or reconcile_error holds.
pub trait Reconciler {
    // K is the type of the object being reconciled.
    type K;
    // S is the type of the local state threaded through reconcile_core.
    type S;

    fn reconcile_init_state(&self) -> Self::S;

    fn reconcile_core(&self, cr: &Self::K, resp_o: Option<Response>, state: Self::S) -> (Self::S, Option<Request>);

    fn reconcile_done(&self, state: &Self::S) -> bool;

    fn reconcile_error(&self, state: &Self::S) -> Option<ReconcileFailure>;
}

/// Why reconcile_core ended in its error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileFailure {
    #[error("{request} failed: {error}")]
    Api { request: String, error: APIError },
    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },
    #[error("unexpected response at step {0}")]
    UnexpectedResponse(String),
    #[error("{0} index has not completed its first listing")]
    IndexNotSynced(String),
}

impl ReconcileFailure {
    pub fn api_error(&self) -> Option<APIError> {
        match self {
            ReconcileFailure::Api { error, .. } => Some(*error),
            _ => None,
        }
    }
}
