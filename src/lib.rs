// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod config;
pub mod controllers;
pub mod executable_model;
pub mod kubernetes_api_objects;
pub mod reconciler;
pub mod shim_layer;

use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::reconciler::ReconcileFailure;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object misses \"{0}\"")]
    MissingObjectKey(&'static str),
    #[error("get {0} failed: {1}")]
    CRGetFailed(String, APIError),
    #[error("ReconcileCoreError: {0}")]
    ReconcileCoreError(#[from] ReconcileFailure),
    #[error("MarshalFailed: {0}")]
    MarshalFailed(#[source] serde_json::Error),
}

impl Error {
    /// The API error behind this error, if it came from the API server.
    pub fn api_error(&self) -> Option<APIError> {
        match self {
            Error::CRGetFailed(_, error) => Some(*error),
            Error::ReconcileCoreError(failure) => failure.api_error(),
            _ => None,
        }
    }
}
