// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::executable_model::{
    api_server_state::{ApiOperation, ApiServerState},
    object_map::ObjectMapKey,
};
use crate::kubernetes_api_objects::{api_method::*, error::APIError, marshal::unmarshal};
use crate::shim_layer::api_server::ApiServer;
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

// The ExecutableApiServer is an in-memory model of the Kubernetes API server.
// It implements the subset of the API server behavior the reconciler relies on:
// uid and resourceVersion assignment on create, optimistic concurrency on update,
// and the split between the main resource and the status sub-resource.
// It is what the unit tests drive reconcile passes against.
#[derive(Debug, Default)]
pub struct ExecutableApiServer {
    state: Mutex<ApiServerState>,
}

impl ExecutableApiServer {
    pub fn new() -> ExecutableApiServer {
        ExecutableApiServer::default()
    }

    fn state(&self) -> MutexGuard<'_, ApiServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next request of op fail with error, after any faults already queued for op.
    pub fn inject_fault(&self, op: ApiOperation, error: APIError) {
        self.state()
            .faults
            .entry(op)
            .or_insert_with(VecDeque::new)
            .push_back(error);
    }

    pub fn object(&self, api_resource: &ApiResource, namespace: &str, name: &str) -> Option<DynamicObject> {
        self.state()
            .resources
            .get(&ObjectMapKey::new(&api_resource.kind, namespace, name))
    }

    /// Reads a stored object back as a typed object.
    pub fn typed_object<K: DeserializeOwned>(
        &self,
        api_resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Option<K> {
        self.object(api_resource, namespace, name)
            .and_then(|obj| unmarshal(obj).ok())
    }

    pub fn list(&self, api_resource: &ApiResource, namespace: &str) -> Vec<DynamicObject> {
        self.state().resources.list(&api_resource.kind, namespace)
    }

    pub fn resource_version_counter(&self) -> i64 {
        self.state().resource_version_counter
    }

    /// Overwrites the stored object in place, the way another actor
    /// (a user, or a built-in controller writing status) would.
    /// The object gets a fresh resourceVersion; its uid is kept.
    pub fn mutate<F>(&self, api_resource: &ApiResource, namespace: &str, name: &str, f: F) -> Result<(), APIError>
    where
        F: FnOnce(&mut DynamicObject),
    {
        let mut s = self.state();
        let key = ObjectMapKey::new(&api_resource.kind, namespace, name);
        let mut obj = s.resources.get(&key).ok_or(APIError::ObjectNotFound)?;
        let uid = obj.metadata.uid.clone();
        f(&mut obj);
        obj.metadata.uid = uid;
        obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
        s.resource_version_counter += 1;
        s.resources.insert(key, obj);
        Ok(())
    }

    pub fn handle_get_request(req: &KubeGetRequest, s: &mut ApiServerState) -> Result<DynamicObject, APIError> {
        if let Some(err) = s.take_fault(ApiOperation::Get) {
            return Err(err);
        }
        s.resources
            .get(&ObjectMapKey::new(&req.api_resource.kind, &req.namespace, &req.name))
            .ok_or(APIError::ObjectNotFound)
    }

    fn create_request_admission_check(req: &KubeCreateRequest, s: &ApiServerState) -> Option<APIError> {
        match &req.obj.metadata.name {
            None => Some(APIError::Invalid),
            Some(_) if req.obj.metadata.namespace.as_ref().is_some_and(|ns| ns != &req.namespace) => {
                Some(APIError::BadRequest)
            }
            Some(name) => {
                let key = ObjectMapKey::new(&req.api_resource.kind, &req.namespace, name);
                if s.resources.contains_key(&key) {
                    Some(APIError::ObjectAlreadyExists)
                } else {
                    None
                }
            }
        }
    }

    pub fn handle_create_request(req: &KubeCreateRequest, s: &mut ApiServerState) -> Result<DynamicObject, APIError> {
        if let Some(err) = s.take_fault(ApiOperation::Create) {
            return Err(err);
        }
        if let Some(err) = Self::create_request_admission_check(req, s) {
            return Err(err);
        }
        let mut created_obj = req.obj.clone();
        let name = created_obj.metadata.name.clone().unwrap_or_default();
        created_obj.metadata.namespace = Some(req.namespace.clone());
        created_obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
        created_obj.metadata.uid = Some(format!("uid-{}", s.uid_counter));
        created_obj.metadata.deletion_timestamp = None;
        // The status of a newly created object is owned by the server.
        if let Some(data) = created_obj.data.as_object_mut() {
            data.remove("status");
        }
        s.resources.insert(
            ObjectMapKey::new(&req.api_resource.kind, &req.namespace, &name),
            created_obj.clone(),
        );
        s.uid_counter += 1;
        s.resource_version_counter += 1;
        Ok(created_obj)
    }

    pub fn handle_delete_request(req: &KubeDeleteRequest, s: &mut ApiServerState) -> Result<(), APIError> {
        if let Some(err) = s.take_fault(ApiOperation::Delete) {
            return Err(err);
        }
        let key = ObjectMapKey::new(&req.api_resource.kind, &req.namespace, &req.name);
        match s.resources.remove(&key) {
            Some(_) => {
                s.resource_version_counter += 1;
                Ok(())
            }
            None => Err(APIError::ObjectNotFound),
        }
    }

    fn update_request_admission_check_helper(
        api_resource: &ApiResource,
        name: &str,
        namespace: &str,
        obj: &DynamicObject,
        s: &ApiServerState,
    ) -> Result<DynamicObject, APIError> {
        let key = ObjectMapKey::new(&api_resource.kind, namespace, name);
        if obj.metadata.name.as_deref() != Some(name) {
            return Err(APIError::BadRequest);
        }
        if obj.metadata.namespace.as_ref().is_some_and(|ns| ns != namespace) {
            return Err(APIError::BadRequest);
        }
        let old_obj = s.resources.get(&key).ok_or(APIError::ObjectNotFound)?;
        if let Some(rv) = &obj.metadata.resource_version {
            if Some(rv) != old_obj.metadata.resource_version.as_ref() {
                return Err(APIError::Conflict);
            }
        }
        if obj.metadata.uid.is_some() && obj.metadata.uid != old_obj.metadata.uid {
            return Err(APIError::InternalError);
        }
        Ok(old_obj)
    }

    fn same_object(a: &DynamicObject, b: &DynamicObject) -> bool {
        match (serde_json::to_value(a), serde_json::to_value(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn updated_object(req: &KubeUpdateRequest, old_obj: &DynamicObject) -> DynamicObject {
        let mut updated_obj = req.obj.clone();
        updated_obj.metadata.namespace = Some(req.namespace.clone());
        updated_obj.metadata.resource_version = old_obj.metadata.resource_version.clone();
        updated_obj.metadata.uid = old_obj.metadata.uid.clone();
        updated_obj.metadata.deletion_timestamp = old_obj.metadata.deletion_timestamp.clone();
        // Writes to the main resource never change status.
        if let Some(data) = updated_obj.data.as_object_mut() {
            match old_obj.data.get("status") {
                Some(status) => data.insert("status".to_string(), status.clone()),
                None => data.remove("status"),
            };
        }
        updated_obj
    }

    pub fn handle_update_request(req: &KubeUpdateRequest, s: &mut ApiServerState) -> Result<DynamicObject, APIError> {
        if let Some(err) = s.take_fault(ApiOperation::Update) {
            return Err(err);
        }
        let old_obj =
            Self::update_request_admission_check_helper(&req.api_resource, &req.name, &req.namespace, &req.obj, s)?;
        let mut updated_obj = Self::updated_object(req, &old_obj);
        if Self::same_object(&updated_obj, &old_obj) {
            return Ok(old_obj);
        }
        updated_obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
        s.resources.insert(
            ObjectMapKey::new(&req.api_resource.kind, &req.namespace, &req.name),
            updated_obj.clone(),
        );
        s.resource_version_counter += 1;
        Ok(updated_obj)
    }

    fn status_updated_object(req: &KubeUpdateStatusRequest, old_obj: &DynamicObject) -> DynamicObject {
        // Only status is taken from the request; metadata and spec stay as stored.
        let mut status_updated_obj = old_obj.clone();
        if let Some(data) = status_updated_obj.data.as_object_mut() {
            match req.obj.data.get("status") {
                Some(status) => data.insert("status".to_string(), status.clone()),
                None => data.remove("status"),
            };
        }
        status_updated_obj
    }

    pub fn handle_update_status_request(
        req: &KubeUpdateStatusRequest,
        s: &mut ApiServerState,
    ) -> Result<DynamicObject, APIError> {
        if let Some(err) = s.take_fault(ApiOperation::UpdateStatus) {
            return Err(err);
        }
        let old_obj =
            Self::update_request_admission_check_helper(&req.api_resource, &req.name, &req.namespace, &req.obj, s)?;
        let mut status_updated_obj = Self::status_updated_object(req, &old_obj);
        if Self::same_object(&status_updated_obj, &old_obj) {
            return Ok(old_obj);
        }
        status_updated_obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
        s.resources.insert(
            ObjectMapKey::new(&req.api_resource.kind, &req.namespace, &req.name),
            status_updated_obj.clone(),
        );
        s.resource_version_counter += 1;
        Ok(status_updated_obj)
    }
}

#[async_trait]
impl ApiServer for ExecutableApiServer {
    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError> {
        Self::handle_get_request(req, &mut self.state())
    }

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError> {
        Self::handle_create_request(req, &mut self.state())
    }

    async fn delete(&self, req: &KubeDeleteRequest) -> Result<(), APIError> {
        Self::handle_delete_request(req, &mut self.state())
    }

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        Self::handle_update_request(req, &mut self.state())
    }

    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError> {
        Self::handle_update_status_request(req, &mut self.state())
    }
}
