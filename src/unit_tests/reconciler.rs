// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controllers::mykind_controller::{
    ownership_index::OwnershipIndex,
    reconciler::*,
    resource_builder::make_deployment,
    step::MyKindReconcileStep,
    types::{MyKind, MyKindStatus},
};
use crate::kubernetes_api_objects::{api_method::*, error::APIError, marshal::marshal};
use crate::reconciler::{io::*, reconciler::ReconcileFailure};
use crate::unit_tests::{make_mykind, make_owned_deployment, make_owner_ref};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use kube::runtime::watcher;

fn stored_mykind(child_name: &str, replicas: Option<i32>) -> MyKind {
    let mut mykind = make_mykind("mk", child_name, replicas);
    mykind.metadata.uid = Some("uid-0".to_string());
    mykind.metadata.resource_version = Some("1".to_string());
    mykind
}

// Builds an index that has completed a listing of the given children of "mk".
fn index_with_children(children: &[&str]) -> OwnershipIndex {
    let index = OwnershipIndex::for_owner::<MyKind>();
    index.apply_watcher_event(&watcher::Event::Init);
    for child in children {
        index.apply_watcher_event(&watcher::Event::InitApply(make_owned_deployment(
            child,
            vec![make_owner_ref("mygroup.k8s.io/v1beta1", "MyKind", "mk", true)],
        )));
    }
    index.apply_watcher_event(&watcher::Event::InitDone);
    index
}

fn k_resp(resp: KubeAPIResponse) -> Option<Response> {
    Some(Response::KResponse(resp))
}

fn get_resp(res: Result<Deployment, APIError>) -> Option<Response> {
    k_resp(KubeAPIResponse::GetResponse(KubeGetResponse {
        res: res.map(|deployment| marshal(&deployment).unwrap()),
    }))
}

fn delete_resp(res: Result<(), APIError>) -> Option<Response> {
    k_resp(KubeAPIResponse::DeleteResponse(KubeDeleteResponse { res }))
}

fn existing_deployment(mykind: &MyKind, replicas: Option<i32>, ready: Option<i32>) -> Deployment {
    let mut deployment = make_deployment(mykind).unwrap();
    deployment.metadata.resource_version = Some("7".to_string());
    deployment.spec.as_mut().unwrap().replicas = replicas;
    deployment.status = ready.map(|ready| DeploymentStatus {
        ready_replicas: Some(ready),
        ..DeploymentStatus::default()
    });
    deployment
}

fn step_after_get(
    index: &OwnershipIndex,
    mykind: &MyKind,
    res: Result<Deployment, APIError>,
) -> (MyKindReconcileState, Option<Request>) {
    let (state, req) = reconcile_core(index, mykind, None, reconcile_init_state());
    assert!(matches!(req, Some(Request::KRequest(KubeAPIRequest::GetRequest(_)))));
    reconcile_core(index, mykind, get_resp(res), state)
}

#[test]
pub fn test_reconcile_init_state() {
    let state = reconcile_init_state();
    assert_eq!(state.reconcile_step, MyKindReconcileStep::Init);
    assert!(!reconcile_done(&state));
    assert!(reconcile_error(&state).is_none());
}

#[test]
pub fn test_init_gets_child_when_nothing_is_stale() {
    let index = index_with_children(&["nginx"]);
    let mykind = stored_mykind("nginx", None);
    let (state, req) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterGetDeployment);
    match req {
        Some(Request::KRequest(KubeAPIRequest::GetRequest(req))) => {
            assert_eq!(req.name, "nginx");
            assert_eq!(req.namespace, "default");
            assert_eq!(req.api_resource.kind, "Deployment");
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
pub fn test_cleanup_deletes_stale_children_in_order() {
    let index = index_with_children(&["stale-b", "nginx", "stale-a"]);
    let mykind = stored_mykind("nginx", None);

    let (state, req) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterDeleteStaleDeployment("stale-a".to_string()));
    assert!(matches!(req, Some(Request::KRequest(KubeAPIRequest::DeleteRequest(ref r))) if r.name == "stale-a"));

    let (state, req) = reconcile_core(&index, &mykind, delete_resp(Ok(())), state);
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterRecordDeleted);
    match req {
        Some(Request::EventRequest(event)) => {
            assert_eq!(event.reason, "Deleted");
            assert_eq!(event.message, "Deleted deployment \"stale-a\"");
        }
        other => panic!("unexpected request {:?}", other),
    }

    let (state, req) = reconcile_core(&index, &mykind, Some(Response::EventRecorded), state);
    assert!(matches!(req, Some(Request::KRequest(KubeAPIRequest::DeleteRequest(ref r))) if r.name == "stale-b"));
    let (state, _) = reconcile_core(&index, &mykind, delete_resp(Ok(())), state);
    let (state, req) = reconcile_core(&index, &mykind, Some(Response::EventRecorded), state);

    // The pass ends after the deletions; the child is looked at in the next one.
    assert!(reconcile_done(&state));
    assert_eq!(state.deleted, 2);
    assert!(req.is_none());
}

#[test]
pub fn test_cleanup_tolerates_already_deleted_child() {
    let index = index_with_children(&["stale"]);
    let mykind = stored_mykind("nginx", None);
    let (state, _) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    let (state, req) = reconcile_core(&index, &mykind, delete_resp(Err(APIError::ObjectNotFound)), state);
    // Nothing was deleted by this pass, so it goes on to the child.
    assert_eq!(state.deleted, 0);
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterGetDeployment);
    assert!(matches!(req, Some(Request::KRequest(KubeAPIRequest::GetRequest(_)))));
}

#[test]
pub fn test_unsynced_index_fails_before_any_request() {
    let index = OwnershipIndex::for_owner::<MyKind>();
    // Entries seen outside a listing do not make the index complete.
    index.observe(&make_owned_deployment(
        "nginx",
        vec![make_owner_ref("mygroup.k8s.io/v1beta1", "MyKind", "mk", true)],
    ));
    let mykind = stored_mykind("nginx-v2", None);
    let (state, req) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    assert!(req.is_none());
    assert!(matches!(reconcile_error(&state), Some(ReconcileFailure::IndexNotSynced(_))));
    assert_eq!(reconcile_error(&state).and_then(|f| f.api_error()), None);
}

#[test]
pub fn test_malformed_parent_fails_before_sync_check() {
    let index = OwnershipIndex::for_owner::<MyKind>();
    let mykind = stored_mykind("", None);
    let (state, _) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    assert!(matches!(reconcile_error(&state), Some(ReconcileFailure::Malformed { .. })));
}

#[test]
pub fn test_cleanup_surfaces_delete_failure() {
    let index = index_with_children(&["stale"]);
    let mykind = stored_mykind("nginx", None);
    let (state, _) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    let (state, req) = reconcile_core(&index, &mykind, delete_resp(Err(APIError::InternalError)), state);
    assert!(req.is_none());
    assert_eq!(reconcile_error(&state).and_then(|f| f.api_error()), Some(APIError::InternalError));
}

#[test]
pub fn test_missing_child_is_created() {
    let index = index_with_children(&[]);
    let mykind = stored_mykind("nginx", Some(2));
    let (state, req) = step_after_get(&index, &mykind, Err(APIError::ObjectNotFound));
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterCreateDeployment("nginx".to_string()));
    let obj = match req {
        Some(Request::KRequest(KubeAPIRequest::CreateRequest(req))) => req.obj,
        other => panic!("unexpected request {:?}", other),
    };
    assert_eq!(
        serde_json::to_value(&obj).unwrap(),
        serde_json::to_value(marshal(&make_deployment(&mykind).unwrap()).unwrap()).unwrap()
    );

    let create_resp = k_resp(KubeAPIResponse::CreateResponse(KubeCreateResponse { res: Ok(obj) }));
    let (state, req) = reconcile_core(&index, &mykind, create_resp, state);
    assert!(reconcile_done(&state));
    match req {
        Some(Request::EventRequest(event)) => {
            assert_eq!(event.severity, EventSeverity::Normal);
            assert_eq!(event.reason, "Created");
            assert_eq!(event.message, "Created deployment \"nginx\"");
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
pub fn test_create_failure_is_surfaced() {
    let index = index_with_children(&[]);
    let mykind = stored_mykind("nginx", None);
    let (state, _) = step_after_get(&index, &mykind, Err(APIError::ObjectNotFound));
    let create_resp = k_resp(KubeAPIResponse::CreateResponse(KubeCreateResponse {
        res: Err(APIError::ObjectAlreadyExists),
    }));
    let (state, req) = reconcile_core(&index, &mykind, create_resp, state);
    assert!(req.is_none());
    assert_eq!(reconcile_error(&state).and_then(|f| f.api_error()), Some(APIError::ObjectAlreadyExists));
}

#[test]
pub fn test_get_failure_is_surfaced() {
    let index = index_with_children(&[]);
    let mykind = stored_mykind("nginx", None);
    let (state, req) = step_after_get(&index, &mykind, Err(APIError::Timeout));
    assert!(req.is_none());
    assert_eq!(
        reconcile_error(&state),
        Some(ReconcileFailure::Api {
            request: "get Deployment nginx".to_string(),
            error: APIError::Timeout,
        })
    );
}

#[test]
pub fn test_drifted_replica_count_is_rewritten() {
    let index = index_with_children(&["nginx"]);
    let mykind = stored_mykind("nginx", Some(2));
    let (state, req) = step_after_get(&index, &mykind, Ok(existing_deployment(&mykind, Some(5), Some(5))));
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterScaleDeployment("nginx".to_string(), 2));
    let obj = match req {
        Some(Request::KRequest(KubeAPIRequest::UpdateRequest(req))) => req.obj,
        other => panic!("unexpected request {:?}", other),
    };
    // The update carries the observed resourceVersion for optimistic concurrency.
    assert_eq!(obj.metadata.resource_version.as_deref(), Some("7"));
    assert_eq!(obj.data["spec"]["replicas"], serde_json::json!(2));

    let update_resp = k_resp(KubeAPIResponse::UpdateResponse(KubeUpdateResponse { res: Ok(obj) }));
    let (state, req) = reconcile_core(&index, &mykind, update_resp, state);
    assert!(reconcile_done(&state));
    match req {
        Some(Request::EventRequest(event)) => {
            assert_eq!(event.reason, "Scaled");
            assert_eq!(event.message, "Scaled deployment \"nginx\" to 2 replicas");
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
pub fn test_missing_replica_count_counts_as_one() {
    let index = index_with_children(&["nginx"]);
    let mut mykind = stored_mykind("nginx", None);
    mykind.status = Some(MyKindStatus { ready_replicas: 0 });
    let (state, req) = step_after_get(&index, &mykind, Ok(existing_deployment(&mykind, None, None)));
    assert!(reconcile_done(&state));
    assert!(req.is_none());
}

#[test]
pub fn test_status_sync_writes_ready_replicas() {
    let index = index_with_children(&["nginx"]);
    let mykind = stored_mykind("nginx", Some(3));
    let (state, req) = step_after_get(&index, &mykind, Ok(existing_deployment(&mykind, Some(3), Some(2))));
    assert_eq!(state.reconcile_step, MyKindReconcileStep::AfterUpdateStatus);
    let req = match req {
        Some(Request::KRequest(KubeAPIRequest::UpdateStatusRequest(req))) => req,
        other => panic!("unexpected request {:?}", other),
    };
    assert_eq!(req.name, "mk");
    assert_eq!(req.api_resource.kind, "MyKind");
    assert_eq!(req.obj.data["status"]["readyReplicas"], serde_json::json!(2));

    let status_resp = k_resp(KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
        res: Ok(req.obj),
    }));
    let (state, req) = reconcile_core(&index, &mykind, status_resp, state);
    assert!(reconcile_done(&state));
    assert!(req.is_none());
}

#[test]
pub fn test_status_sync_skips_matching_status() {
    let index = index_with_children(&["nginx"]);
    let mut mykind = stored_mykind("nginx", Some(3));
    mykind.status = Some(MyKindStatus { ready_replicas: 3 });
    let (state, req) = step_after_get(&index, &mykind, Ok(existing_deployment(&mykind, Some(3), Some(3))));
    assert!(reconcile_done(&state));
    assert!(req.is_none());
}

#[test]
pub fn test_status_update_failure_is_surfaced() {
    let index = index_with_children(&["nginx"]);
    let mykind = stored_mykind("nginx", None);
    let (state, _) = step_after_get(&index, &mykind, Ok(existing_deployment(&mykind, Some(1), Some(1))));
    let status_resp = k_resp(KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
        res: Err(APIError::Conflict),
    }));
    let (state, req) = reconcile_core(&index, &mykind, status_resp, state);
    assert!(req.is_none());
    assert!(!reconcile_done(&state));
    assert_eq!(reconcile_error(&state).and_then(|f| f.api_error()), Some(APIError::Conflict));
}

#[test]
pub fn test_malformed_parent_aborts_before_any_request() {
    let index = index_with_children(&["nginx"]);
    for mykind in [stored_mykind("", None), stored_mykind("nginx", Some(-1))] {
        let (state, req) = reconcile_core(&index, &mykind, None, reconcile_init_state());
        assert!(req.is_none());
        assert!(matches!(reconcile_error(&state), Some(ReconcileFailure::Malformed { .. })));
    }
    let too_long = "n".repeat(65);
    let (state, _) = reconcile_core(&index, &stored_mykind(&too_long, None), None, reconcile_init_state());
    assert!(matches!(reconcile_error(&state), Some(ReconcileFailure::Malformed { .. })));
}

#[test]
pub fn test_unexpected_response_is_an_error() {
    let index = index_with_children(&[]);
    let mykind = stored_mykind("nginx", None);
    let (state, _) = reconcile_core(&index, &mykind, None, reconcile_init_state());
    let (state, req) = reconcile_core(&index, &mykind, Some(Response::EventRecorded), state);
    assert!(req.is_none());
    assert!(matches!(reconcile_error(&state), Some(ReconcileFailure::UnexpectedResponse(_))));
}

#[test]
pub fn test_terminal_states_issue_nothing() {
    let index = index_with_children(&[]);
    let mykind = stored_mykind("nginx", None);
    let done = MyKindReconcileState {
        reconcile_step: MyKindReconcileStep::Done,
        ..reconcile_init_state()
    };
    let (state, req) = reconcile_core(&index, &mykind, None, done.clone());
    assert_eq!(state, done);
    assert!(req.is_none());
}
