// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::{
    api_method::*,
    error::{kube_error_to_api_error, APIError},
};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, PostParams};
use kube::Client;
use tracing::{debug, warn};

/// ApiServer executes the API requests issued by reconcile_core.
///
/// The shim layer only talks to the object store through this trait, so a
/// reconcile pass runs the same against a real cluster ([`KubeApiServer`])
/// and against the in-memory model used in tests.
#[async_trait]
pub trait ApiServer: Send + Sync {
    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError>;

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError>;

    async fn delete(&self, req: &KubeDeleteRequest) -> Result<(), APIError>;

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError>;

    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError>;

    async fn handle(&self, req: KubeAPIRequest) -> KubeAPIResponse {
        match req {
            KubeAPIRequest::GetRequest(req) => KubeAPIResponse::GetResponse(KubeGetResponse {
                res: self.get(&req).await,
            }),
            KubeAPIRequest::CreateRequest(req) => KubeAPIResponse::CreateResponse(KubeCreateResponse {
                res: self.create(&req).await,
            }),
            KubeAPIRequest::DeleteRequest(req) => KubeAPIResponse::DeleteResponse(KubeDeleteResponse {
                res: self.delete(&req).await,
            }),
            KubeAPIRequest::UpdateRequest(req) => KubeAPIResponse::UpdateResponse(KubeUpdateResponse {
                res: self.update(&req).await,
            }),
            KubeAPIRequest::UpdateStatusRequest(req) => {
                KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
                    res: self.update_status(&req).await,
                })
            }
        }
    }
}

// KubeApiServer sends requests to the Kubernetes API through kube-rs.
#[derive(Clone)]
pub struct KubeApiServer {
    client: Client,
}

impl KubeApiServer {
    pub fn new(client: Client) -> KubeApiServer {
        KubeApiServer { client }
    }

    fn api(&self, api_resource: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::<DynamicObject>::namespaced_with(self.client.clone(), namespace, api_resource)
    }
}

fn log_result<T>(verb: &str, key: &str, res: Result<T, kube::Error>) -> Result<T, APIError> {
    match res {
        Ok(obj) => {
            debug!(request = %key, "{} done", verb);
            Ok(obj)
        }
        Err(err) => {
            let api_error = kube_error_to_api_error(&err);
            // NotFound is routine for gets and deletes; the caller decides whether it matters.
            if api_error.is_object_not_found() {
                debug!(request = %key, error = %err, "{} failed", verb);
            } else {
                warn!(request = %key, error = %err, "{} failed", verb);
            }
            Err(api_error)
        }
    }
}

#[async_trait]
impl ApiServer for KubeApiServer {
    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError> {
        let res = self.api(&req.api_resource, &req.namespace).get(&req.name).await;
        log_result("Get", &req.key(), res)
    }

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError> {
        let pp = PostParams::default();
        let res = self.api(&req.api_resource, &req.namespace).create(&pp, &req.obj).await;
        log_result("Create", &req.key(), res)
    }

    async fn delete(&self, req: &KubeDeleteRequest) -> Result<(), APIError> {
        // Background propagation lets the garbage collector remove the pods.
        let dp = DeleteParams::background();
        let res = self
            .api(&req.api_resource, &req.namespace)
            .delete(&req.name, &dp)
            .await
            .map(|_| ());
        log_result("Delete", &req.key(), res)
    }

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        let pp = PostParams::default();
        let res = self
            .api(&req.api_resource, &req.namespace)
            .replace(&req.name, &pp, &req.obj)
            .await;
        log_result("Update", &req.key(), res)
    }

    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError> {
        let data = serde_json::to_vec(&req.obj).map_err(|err| {
            warn!(request = %req.key(), error = %err, "failed to serialize status update");
            APIError::BadRequest
        })?;
        let pp = PostParams::default();
        let res = self
            .api(&req.api_resource, &req.namespace)
            .replace_status(&req.name, &pp, data)
            .await;
        log_result("UpdateStatus", &req.key(), res)
    }
}
