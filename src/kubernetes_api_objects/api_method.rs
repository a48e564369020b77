// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use kube::api::{ApiResource, DynamicObject};

// KubeAPIRequest represents API requests issued by reconcile_core.
//
// kube-rs uses a generic type kube::api::Api as an api handle to send
// requests to the Kubernetes API.
// Each request carries the ApiResource and namespace needed to instantiate
// an Api<DynamicObject>, plus the arguments of the corresponding method.
#[derive(Debug, Clone)]
pub enum KubeAPIRequest {
    GetRequest(KubeGetRequest),
    CreateRequest(KubeCreateRequest),
    DeleteRequest(KubeDeleteRequest),
    UpdateRequest(KubeUpdateRequest),
    UpdateStatusRequest(KubeUpdateStatusRequest),
}

impl KubeAPIRequest {
    pub fn key(&self) -> String {
        match self {
            KubeAPIRequest::GetRequest(req) => req.key(),
            KubeAPIRequest::CreateRequest(req) => req.key(),
            KubeAPIRequest::DeleteRequest(req) => req.key(),
            KubeAPIRequest::UpdateRequest(req) => req.key(),
            KubeAPIRequest::UpdateStatusRequest(req) => req.key(),
        }
    }

    /// Get is the only request that leaves the stored state untouched.
    pub fn is_write(&self) -> bool {
        !matches!(self, KubeAPIRequest::GetRequest(_))
    }
}

// KubeGetRequest has the name as the parameter of Api.get(), and namespace to instantiate an Api.
#[derive(Debug, Clone)]
pub struct KubeGetRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
}

impl KubeGetRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeCreateRequest has the obj as the parameter of Api.create().
#[derive(Debug, Clone)]
pub struct KubeCreateRequest {
    pub api_resource: ApiResource,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeCreateRequest {
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_resource.kind,
            self.namespace,
            self.obj.metadata.name.as_deref().unwrap_or_default()
        )
    }
}

// KubeDeleteRequest has the name as the parameter of Api.delete(), and namespace to instantiate an Api.
#[derive(Debug, Clone)]
pub struct KubeDeleteRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
}

impl KubeDeleteRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeUpdateRequest has the obj as the parameter of Api.replace().
#[derive(Debug, Clone)]
pub struct KubeUpdateRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeUpdateStatusRequest has the obj as the parameter of Api.replace_status().
#[derive(Debug, Clone)]
pub struct KubeUpdateStatusRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateStatusRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeAPIResponse wraps around the results returned by the methods of kube::api::Api.
#[derive(Debug, Clone)]
pub enum KubeAPIResponse {
    GetResponse(KubeGetResponse),
    CreateResponse(KubeCreateResponse),
    DeleteResponse(KubeDeleteResponse),
    UpdateResponse(KubeUpdateResponse),
    UpdateStatusResponse(KubeUpdateStatusResponse),
}

impl KubeAPIResponse {
    pub fn is_ok(&self) -> bool {
        match self {
            KubeAPIResponse::GetResponse(resp) => resp.res.is_ok(),
            KubeAPIResponse::CreateResponse(resp) => resp.res.is_ok(),
            KubeAPIResponse::DeleteResponse(resp) => resp.res.is_ok(),
            KubeAPIResponse::UpdateResponse(resp) => resp.res.is_ok(),
            KubeAPIResponse::UpdateStatusResponse(resp) => resp.res.is_ok(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KubeGetResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeCreateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeDeleteResponse {
    pub res: Result<(), APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeUpdateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeUpdateStatusResponse {
    pub res: Result<DynamicObject, APIError>,
}
