// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controllers::mykind_controller::{
    ownership_index::OwnershipIndex,
    resource_builder::{deployment_api_resource, make_deployment, mykind_api_resource},
    step::MyKindReconcileStep,
    types::{MyKind, MyKindStatus, DEFAULT_REPLICAS},
};
use crate::kubernetes_api_objects::{
    api_method::*,
    error::APIError,
    marshal::{marshal, unmarshal},
};
use crate::reconciler::{io::*, reconciler::*};
use k8s_openapi::api::apps::v1::Deployment;
use std::sync::Arc;
use tracing::{debug, info};

// MyKindReconcileState describes the local state with which reconcile_core makes decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyKindReconcileState {
    pub reconcile_step: MyKindReconcileStep,
    // Attributed Deployments whose names differ from spec.childName and are not deleted yet.
    pub stale_deployments: Vec<String>,
    pub deleted: usize,
}

/// MyKindReconciler drives one Deployment per MyKind toward the MyKind's spec
/// and mirrors the Deployment's ready replica count into the MyKind's status.
///
/// Every pass performs at most one class of write: deleting stale Deployments,
/// creating the Deployment, scaling it, or updating the MyKind status. The
/// watch event caused by that write triggers the pass that takes the next step.
pub struct MyKindReconciler {
    ownership_index: Arc<OwnershipIndex>,
}

impl MyKindReconciler {
    pub fn new(ownership_index: Arc<OwnershipIndex>) -> MyKindReconciler {
        MyKindReconciler { ownership_index }
    }

    pub fn ownership_index(&self) -> &Arc<OwnershipIndex> {
        &self.ownership_index
    }
}

impl Reconciler for MyKindReconciler {
    type K = MyKind;
    type S = MyKindReconcileState;

    fn reconcile_init_state(&self) -> MyKindReconcileState {
        reconcile_init_state()
    }

    fn reconcile_core(
        &self,
        mykind: &MyKind,
        resp_o: Option<Response>,
        state: MyKindReconcileState,
    ) -> (MyKindReconcileState, Option<Request>) {
        reconcile_core(&self.ownership_index, mykind, resp_o, state)
    }

    fn reconcile_done(&self, state: &MyKindReconcileState) -> bool {
        reconcile_done(state)
    }

    fn reconcile_error(&self, state: &MyKindReconcileState) -> Option<ReconcileFailure> {
        reconcile_error(state)
    }
}

pub fn reconcile_init_state() -> MyKindReconcileState {
    MyKindReconcileState {
        reconcile_step: MyKindReconcileStep::Init,
        stale_deployments: Vec::new(),
        deleted: 0,
    }
}

pub fn reconcile_done(state: &MyKindReconcileState) -> bool {
    matches!(state.reconcile_step, MyKindReconcileStep::Done)
}

pub fn reconcile_error(state: &MyKindReconcileState) -> Option<ReconcileFailure> {
    match &state.reconcile_step {
        MyKindReconcileStep::Error(failure) => Some(failure.clone()),
        _ => None,
    }
}

pub fn reconcile_core(
    ownership_index: &OwnershipIndex,
    mykind: &MyKind,
    resp_o: Option<Response>,
    state: MyKindReconcileState,
) -> (MyKindReconcileState, Option<Request>) {
    let (Some(name), Some(namespace)) = (mykind.metadata.name.as_ref(), mykind.metadata.namespace.as_ref()) else {
        return malformed(state, "MyKind", "metadata misses name or namespace".to_string());
    };
    let deployment_name = &mykind.spec.child_name;
    match &state.reconcile_step {
        MyKindReconcileStep::Init => {
            if let Err(reason) = mykind.state_validation() {
                return malformed(state, "MyKind", reason);
            }
            // Without a full listing, a renamed MyKind would look like it has no stale children.
            if !ownership_index.is_synced() {
                debug!(mykind = %name, "ownership index not synced yet");
                let failure = ReconcileFailure::IndexNotSynced("Deployment ownership".to_string());
                return (error_state(state, failure), None);
            }
            debug!(mykind = %name, "finding existing Deployments for MyKind resource");
            let stale_deployments = ownership_index
                .children_of(namespace, name)
                .into_iter()
                .filter(|child| child != deployment_name)
                .collect();
            let state_prime = MyKindReconcileState {
                stale_deployments,
                ..state
            };
            cleanup_next(mykind, namespace, state_prime)
        }
        MyKindReconcileStep::AfterDeleteStaleDeployment(stale_name) => {
            let stale_name = stale_name.clone();
            match extract_delete_resp(resp_o) {
                Some(Ok(())) => {
                    let state_prime = MyKindReconcileState {
                        reconcile_step: MyKindReconcileStep::AfterRecordDeleted,
                        deleted: state.deleted.saturating_add(1),
                        ..state
                    };
                    let event = ReconcileEvent::normal(
                        "Deleted",
                        "Delete",
                        format!("Deleted deployment \"{}\"", stale_name),
                    );
                    (state_prime, Some(Request::EventRequest(event)))
                }
                // Someone else removed it first; nothing left to clean up.
                Some(Err(APIError::ObjectNotFound)) => cleanup_next(mykind, namespace, state),
                Some(Err(error)) => api_failure(state, format!("delete Deployment {}", stale_name), error),
                None => unexpected_response(state),
            }
        }
        MyKindReconcileStep::AfterRecordDeleted => cleanup_next(mykind, namespace, state),
        MyKindReconcileStep::AfterGetDeployment => match extract_get_resp(resp_o) {
            Some(Err(APIError::ObjectNotFound)) => {
                info!(mykind = %name, deployment_name = %deployment_name, "could not find existing Deployment for MyKind, creating one");
                let obj = match make_deployment(mykind).and_then(|deployment| marshal(&deployment)) {
                    Ok(obj) => obj,
                    Err(err) => return malformed(state, "desired Deployment", err.to_string()),
                };
                let req = KubeAPIRequest::CreateRequest(KubeCreateRequest {
                    api_resource: deployment_api_resource(),
                    namespace: namespace.clone(),
                    obj,
                });
                let state_prime = MyKindReconcileState {
                    reconcile_step: MyKindReconcileStep::AfterCreateDeployment(deployment_name.clone()),
                    ..state
                };
                (state_prime, Some(Request::KRequest(req)))
            }
            Some(Err(error)) => api_failure(state, format!("get Deployment {}", deployment_name), error),
            Some(Ok(obj)) => match unmarshal::<Deployment>(obj) {
                Ok(deployment) => reconcile_existing_deployment(mykind, name, namespace, deployment, state),
                Err(err) => malformed(state, "Deployment", err.to_string()),
            },
            None => unexpected_response(state),
        },
        MyKindReconcileStep::AfterCreateDeployment(created_name) => {
            let created_name = created_name.clone();
            match extract_create_resp(resp_o) {
                Some(Ok(_)) => {
                    info!(mykind = %name, deployment_name = %created_name, "created Deployment resource for MyKind");
                    let event = ReconcileEvent::normal(
                        "Created",
                        "Create",
                        format!("Created deployment \"{}\"", created_name),
                    );
                    (done_state(state), Some(Request::EventRequest(event)))
                }
                Some(Err(error)) => api_failure(state, format!("create Deployment {}", created_name), error),
                None => unexpected_response(state),
            }
        }
        MyKindReconcileStep::AfterScaleDeployment(scaled_name, replicas) => {
            let (scaled_name, replicas) = (scaled_name.clone(), *replicas);
            match extract_update_resp(resp_o) {
                Some(Ok(_)) => {
                    let event = ReconcileEvent::normal(
                        "Scaled",
                        "Scale",
                        format!("Scaled deployment \"{}\" to {} replicas", scaled_name, replicas),
                    );
                    (done_state(state), Some(Request::EventRequest(event)))
                }
                Some(Err(error)) => api_failure(state, format!("update Deployment {} replica count", scaled_name), error),
                None => unexpected_response(state),
            }
        }
        MyKindReconcileStep::AfterUpdateStatus => match extract_update_status_resp(resp_o) {
            Some(Ok(_)) => {
                info!(mykind = %name, "resource status synced");
                (done_state(state), None)
            }
            Some(Err(error)) => api_failure(state, format!("update MyKind {} status", name), error),
            None => unexpected_response(state),
        },
        MyKindReconcileStep::Done | MyKindReconcileStep::Error(_) => (state, None),
    }
}

// cleanup_next deletes the next stale Deployment, or moves on once none is left.
// A pass that deleted anything ends right after the cleanup; the deletions
// trigger the next pass, which looks at the Deployment named by spec.childName.
fn cleanup_next(
    mykind: &MyKind,
    namespace: &str,
    mut state: MyKindReconcileState,
) -> (MyKindReconcileState, Option<Request>) {
    if !state.stale_deployments.is_empty() {
        let stale_name = state.stale_deployments.remove(0);
        let req = KubeAPIRequest::DeleteRequest(KubeDeleteRequest {
            api_resource: deployment_api_resource(),
            name: stale_name.clone(),
            namespace: namespace.to_string(),
        });
        let state_prime = MyKindReconcileState {
            reconcile_step: MyKindReconcileStep::AfterDeleteStaleDeployment(stale_name),
            ..state
        };
        return (state_prime, Some(Request::KRequest(req)));
    }
    let name = mykind.metadata.name.as_deref().unwrap_or_default();
    info!(mykind = %name, number_deleted = state.deleted, "finished cleaning up old Deployment resources");
    if state.deleted > 0 {
        return (done_state(state), None);
    }
    let deployment_name = &mykind.spec.child_name;
    debug!(mykind = %name, deployment_name = %deployment_name, "checking if an existing Deployment exists for this resource");
    let req = KubeAPIRequest::GetRequest(KubeGetRequest {
        api_resource: deployment_api_resource(),
        name: deployment_name.clone(),
        namespace: namespace.to_string(),
    });
    let state_prime = MyKindReconcileState {
        reconcile_step: MyKindReconcileStep::AfterGetDeployment,
        ..state
    };
    (state_prime, Some(Request::KRequest(req)))
}

fn reconcile_existing_deployment(
    mykind: &MyKind,
    name: &str,
    namespace: &str,
    mut deployment: Deployment,
    state: MyKindReconcileState,
) -> (MyKindReconcileState, Option<Request>) {
    let deployment_name = &mykind.spec.child_name;
    let expected_replicas = mykind.expected_replicas();
    // The API server defaults a missing replica count to one.
    let current_replicas = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(DEFAULT_REPLICAS);

    if current_replicas != expected_replicas {
        info!(mykind = %name, deployment_name = %deployment_name, old_count = current_replicas, new_count = expected_replicas, "updating replica count");
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(expected_replicas);
        let obj = match marshal(&deployment) {
            Ok(obj) => obj,
            Err(err) => return malformed(state, "Deployment", err.to_string()),
        };
        let req = KubeAPIRequest::UpdateRequest(KubeUpdateRequest {
            api_resource: deployment_api_resource(),
            name: deployment_name.clone(),
            namespace: namespace.to_string(),
            obj,
        });
        let state_prime = MyKindReconcileState {
            reconcile_step: MyKindReconcileStep::AfterScaleDeployment(deployment_name.clone(), expected_replicas),
            ..state
        };
        return (state_prime, Some(Request::KRequest(req)));
    }

    debug!(mykind = %name, replica_count = current_replicas, "replica count up to date");
    let ready_replicas = deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);
    if mykind.ready_replicas() == ready_replicas && mykind.status.is_some() {
        return (done_state(state), None);
    }

    info!(mykind = %name, ready_replicas = ready_replicas, "updating MyKind resource status");
    let mut mykind_prime = mykind.clone();
    mykind_prime.status = Some(MyKindStatus { ready_replicas });
    let obj = match marshal(&mykind_prime) {
        Ok(obj) => obj,
        Err(err) => return malformed(state, "MyKind", err.to_string()),
    };
    let req = KubeAPIRequest::UpdateStatusRequest(KubeUpdateStatusRequest {
        api_resource: mykind_api_resource(),
        name: name.to_string(),
        namespace: namespace.to_string(),
        obj,
    });
    let state_prime = MyKindReconcileState {
        reconcile_step: MyKindReconcileStep::AfterUpdateStatus,
        ..state
    };
    (state_prime, Some(Request::KRequest(req)))
}

fn done_state(state: MyKindReconcileState) -> MyKindReconcileState {
    MyKindReconcileState {
        reconcile_step: MyKindReconcileStep::Done,
        ..state
    }
}

fn error_state(state: MyKindReconcileState, failure: ReconcileFailure) -> MyKindReconcileState {
    MyKindReconcileState {
        reconcile_step: MyKindReconcileStep::Error(failure),
        ..state
    }
}

fn api_failure(
    state: MyKindReconcileState,
    request: String,
    error: APIError,
) -> (MyKindReconcileState, Option<Request>) {
    (error_state(state, ReconcileFailure::Api { request, error }), None)
}

fn malformed(state: MyKindReconcileState, what: &str, reason: String) -> (MyKindReconcileState, Option<Request>) {
    let failure = ReconcileFailure::Malformed {
        what: what.to_string(),
        reason,
    };
    (error_state(state, failure), None)
}

fn unexpected_response(state: MyKindReconcileState) -> (MyKindReconcileState, Option<Request>) {
    let step = format!("{:?}", state.reconcile_step);
    (error_state(state, ReconcileFailure::UnexpectedResponse(step)), None)
}
