// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controllers::mykind_controller::{
    resource_builder::{deployment_api_resource, mykind_api_resource},
    types::MyKind,
};
use crate::kubernetes_api_objects::{
    api_method::*,
    common::ObjectKey,
    error::{kube_error_to_api_error, APIError},
    marshal::{marshal, unmarshal},
};
use crate::unit_tests::make_mykind;
use kube::api::ApiResource;
use kube::core::ErrorResponse;

fn api_resource() -> ApiResource {
    ApiResource {
        group: "group".to_string(),
        version: "version".to_string(),
        kind: "kind".to_string(),
        api_version: "api_version".to_string(),
        plural: "plural".to_string(),
    }
}

#[test]
pub fn test_getrequest_key() {
    let req = KubeGetRequest {
        api_resource: api_resource(),
        name: "name".to_string(),
        namespace: "namespace".to_string(),
    };
    assert_eq!(req.key(), "kind/namespace/name");
    assert!(!KubeAPIRequest::GetRequest(req).is_write());
}

#[test]
pub fn test_createrequest_key() {
    let req = KubeCreateRequest {
        api_resource: mykind_api_resource(),
        namespace: "namespace".to_string(),
        obj: marshal(&make_mykind("name", "nginx", None)).unwrap(),
    };
    assert_eq!(req.key(), "MyKind/namespace/name");
    assert!(KubeAPIRequest::CreateRequest(req).is_write());
}

#[test]
pub fn test_deleterequest_key() {
    let req = KubeAPIRequest::DeleteRequest(KubeDeleteRequest {
        api_resource: deployment_api_resource(),
        name: "name".to_string(),
        namespace: "namespace".to_string(),
    });
    assert_eq!(req.key(), "Deployment/namespace/name");
    assert!(req.is_write());
}

#[test]
pub fn test_update_requests_are_writes() {
    let obj = marshal(&make_mykind("name", "nginx", None)).unwrap();
    let update = KubeAPIRequest::UpdateRequest(KubeUpdateRequest {
        api_resource: api_resource(),
        name: "name".to_string(),
        namespace: "namespace".to_string(),
        obj: obj.clone(),
    });
    let update_status = KubeAPIRequest::UpdateStatusRequest(KubeUpdateStatusRequest {
        api_resource: api_resource(),
        name: "name".to_string(),
        namespace: "namespace".to_string(),
        obj,
    });
    assert_eq!(update.key(), "kind/namespace/name");
    assert_eq!(update_status.key(), "kind/namespace/name");
    assert!(update.is_write());
    assert!(update_status.is_write());
}

#[test]
pub fn test_marshal_keeps_type_meta() {
    let mykind = make_mykind("name", "nginx", Some(2));
    let obj = marshal(&mykind).unwrap();
    let types = obj.types.clone().unwrap();
    assert_eq!(types.api_version, "mygroup.k8s.io/v1beta1");
    assert_eq!(types.kind, "MyKind");
    let back: MyKind = unmarshal(obj).unwrap();
    assert_eq!(back.spec, mykind.spec);
    assert_eq!(back.metadata, mykind.metadata);
}

#[test]
pub fn test_unmarshal_rejects_wrong_shape() {
    let mut obj = marshal(&make_mykind("name", "nginx", None)).unwrap();
    obj.data["spec"] = serde_json::json!({ "replicas": "many" });
    assert!(unmarshal::<MyKind>(obj).is_err());
}

fn error_response(reason: &str, code: u16) -> ErrorResponse {
    ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} happened", reason),
        reason: reason.to_string(),
        code,
    }
}

#[test]
pub fn test_kube_error_to_api_error() {
    let cases = [
        ("NotFound", 404, APIError::ObjectNotFound),
        ("AlreadyExists", 409, APIError::ObjectAlreadyExists),
        ("Conflict", 409, APIError::Conflict),
        ("BadRequest", 400, APIError::BadRequest),
        ("Invalid", 422, APIError::Invalid),
        ("InternalError", 500, APIError::InternalError),
        ("Timeout", 504, APIError::Timeout),
        ("ServerTimeout", 504, APIError::ServerTimeout),
        ("Forbidden", 403, APIError::Other),
    ];
    for (reason, code, expected) in cases {
        let err = kube::Error::Api(error_response(reason, code));
        assert_eq!(kube_error_to_api_error(&err), expected);
        if expected != APIError::Other {
            assert_eq!(expected.reason(), reason);
        }
    }
    assert!(APIError::ObjectNotFound.is_object_not_found());
    assert!(APIError::Conflict.is_conflict());
    assert_eq!(APIError::Timeout.to_string(), "Timeout");
}

#[test]
pub fn test_object_key() {
    let mykind = make_mykind("name", "nginx", None);
    let key = ObjectKey::of(&mykind).unwrap();
    assert_eq!(key, ObjectKey::new("default", "name"));
    assert_eq!(key.to_string(), "default/name");

    let mut nameless = mykind;
    nameless.metadata.name = None;
    assert!(ObjectKey::of(&nameless).is_none());
}
