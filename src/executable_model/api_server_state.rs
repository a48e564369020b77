// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::executable_model::object_map::ObjectMap;
use crate::kubernetes_api_objects::error::APIError;
use std::collections::{HashMap, VecDeque};

/// The API verbs a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Get,
    Create,
    Delete,
    Update,
    UpdateStatus,
}

// ApiServerState is the "state" of the executable API server model.
#[derive(Debug, Default)]
pub struct ApiServerState {
    pub resources: ObjectMap,
    pub uid_counter: i64,
    pub resource_version_counter: i64,
    // Pending faults are consumed one per request of the matching verb,
    // before the request touches resources.
    pub faults: HashMap<ApiOperation, VecDeque<APIError>>,
}

impl ApiServerState {
    pub fn new() -> ApiServerState {
        ApiServerState::default()
    }

    pub fn take_fault(&mut self, op: ApiOperation) -> Option<APIError> {
        self.faults.get_mut(&op).and_then(|queue| queue.pop_front())
    }
}
