// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::core::ErrorResponse;
use std::fmt;

/// APIError is the failure reported by the API server for a single request,
/// reduced to the cases the reconciler makes decisions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum APIError {
    ObjectNotFound,
    ObjectAlreadyExists,
    Conflict,
    BadRequest,
    Invalid,
    InternalError,
    Timeout,
    ServerTimeout,
    Other,
}

impl APIError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, APIError::ObjectNotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, APIError::Conflict)
    }

    /// The canonical `reason` string the Kubernetes API server uses for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            APIError::ObjectNotFound => "NotFound",
            APIError::ObjectAlreadyExists => "AlreadyExists",
            APIError::Conflict => "Conflict",
            APIError::BadRequest => "BadRequest",
            APIError::Invalid => "Invalid",
            APIError::InternalError => "InternalError",
            APIError::Timeout => "Timeout",
            APIError::ServerTimeout => "ServerTimeout",
            APIError::Other => "Other",
        }
    }
}

impl fmt::Display for APIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl From<&ErrorResponse> for APIError {
    fn from(resp: &ErrorResponse) -> Self {
        match resp.reason.as_str() {
            "NotFound" => APIError::ObjectNotFound,
            "AlreadyExists" => APIError::ObjectAlreadyExists,
            "Conflict" => APIError::Conflict,
            "BadRequest" => APIError::BadRequest,
            "Invalid" => APIError::Invalid,
            "InternalError" => APIError::InternalError,
            "Timeout" => APIError::Timeout,
            "ServerTimeout" => APIError::ServerTimeout,
            _ => APIError::Other,
        }
    }
}

// kube_error_to_api_error translates the error returned by kube-rs APIs
// into the form that reconcile_core can match on.
// Transport failures never reached the API server, so they carry no reason.
pub fn kube_error_to_api_error(error: &kube::Error) -> APIError {
    match error {
        kube::Error::Api(error_resp) => APIError::from(error_resp),
        _ => APIError::Other,
    }
}
