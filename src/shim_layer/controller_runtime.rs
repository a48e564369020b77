// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::RunConfig;
use crate::controllers::mykind_controller::{
    ownership_index::OwnershipIndex, reconciler::MyKindReconciler, types::MyKind,
};
use crate::kubernetes_api_objects::{
    api_method::{KubeAPIRequest, KubeGetRequest},
    common::ObjectKey,
    error::APIError,
    marshal::unmarshal,
};
use crate::reconciler::{
    io::{Request, Response},
    reconciler::Reconciler,
};
use crate::shim_layer::api_server::{ApiServer, KubeApiServer};
use crate::shim_layer::backoff::RetryTracker;
use crate::shim_layer::event_recorder::{EventRecorder, KubeEventRecorder};
use crate::Error;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ApiResource};
use kube::runtime::{
    controller::{self, Action, Controller},
    reflector::ObjectRef,
    watcher, WatchStreamExt,
};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// The shim layer connects reconcile_core to the API server.
// kube-rs requires a reconcile function (impl FnMut(Arc<K>, Arc<Ctx>) -> ReconcilerFut)
// to build a controller; reconcile below implements it on top of reconcile_with,
// which drives the reconciler's reconcile_core.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerb {
    Create,
    Delete,
    Update,
    UpdateStatus,
}

impl fmt::Display for WriteVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            WriteVerb::Create => "create",
            WriteVerb::Delete => "delete",
            WriteVerb::Update => "update",
            WriteVerb::UpdateStatus => "update-status",
        };
        f.write_str(verb)
    }
}

/// A write the API server accepted during a reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedWrite {
    pub verb: WriteVerb,
    pub kind: String,
    pub key: ObjectKey,
}

impl AppliedWrite {
    fn of(req: &KubeAPIRequest) -> Option<AppliedWrite> {
        let (verb, api_resource, namespace, name) = match req {
            KubeAPIRequest::GetRequest(_) => return None,
            KubeAPIRequest::CreateRequest(req) => (
                WriteVerb::Create,
                &req.api_resource,
                &req.namespace,
                req.obj.metadata.name.clone().unwrap_or_default(),
            ),
            KubeAPIRequest::DeleteRequest(req) => {
                (WriteVerb::Delete, &req.api_resource, &req.namespace, req.name.clone())
            }
            KubeAPIRequest::UpdateRequest(req) => {
                (WriteVerb::Update, &req.api_resource, &req.namespace, req.name.clone())
            }
            KubeAPIRequest::UpdateStatusRequest(req) => (
                WriteVerb::UpdateStatus,
                &req.api_resource,
                &req.namespace,
                req.name.clone(),
            ),
        };
        Some(AppliedWrite {
            verb,
            kind: api_resource.kind.clone(),
            key: ObjectKey::new(namespace.clone(), name),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    // The object was gone by the time the pass fetched it.
    ParentAbsent,
    Reconciled { writes: Vec<AppliedWrite> },
}

impl ReconcileOutcome {
    pub fn writes(&self) -> &[AppliedWrite] {
        match self {
            ReconcileOutcome::ParentAbsent => &[],
            ReconcileOutcome::Reconciled { writes } => writes,
        }
    }
}

// reconcile_with runs one reconcile pass for the object identified by key.
//
// It fetches the latest version of the object from the API server, then invokes
// reconciler.reconcile_core in a loop: it starts with reconciler.reconcile_init_state,
// and in each iteration it invokes reconcile_core with the state and the response
// returned for the previous request.
// API requests are sent to api_server and event requests go to recorder.
// The loop ends when the reconciler reports the pass is done (reconcile_done)
// or failed (reconcile_error).
pub async fn reconcile_with<R>(
    key: &ObjectKey,
    reconciler: &R,
    api_server: &dyn ApiServer,
    recorder: &dyn EventRecorder,
) -> Result<ReconcileOutcome, Error>
where
    R: Reconciler,
    R::K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let cr_api_resource = ApiResource::erase::<R::K>(&());
    let log_header = format!("{}/{}", cr_api_resource.kind, key);
    let get_cr_req = KubeGetRequest {
        api_resource: cr_api_resource,
        name: key.name.clone(),
        namespace: key.namespace.clone(),
    };
    // Always read the latest version instead of the one cached by the watcher.
    let cr: R::K = match api_server.get(&get_cr_req).await {
        Err(APIError::ObjectNotFound) => {
            debug!(object = %log_header, "not found, end reconcile");
            return Ok(ReconcileOutcome::ParentAbsent);
        }
        Err(err) => {
            warn!(object = %log_header, error = %err, "get failed, will retry reconcile");
            return Err(Error::CRGetFailed(log_header, err));
        }
        Ok(obj) => unmarshal(obj)?,
    };
    let object_ref = cr.object_ref(&());

    let mut state = reconciler.reconcile_init_state();
    let mut resp_o: Option<Response> = None;
    let mut writes = Vec::new();
    loop {
        if reconciler.reconcile_done(&state) {
            debug!(object = %log_header, "reconcile done");
            break;
        }
        if let Some(failure) = reconciler.reconcile_error(&state) {
            warn!(object = %log_header, error = %failure, "reconcile error");
            return Err(Error::ReconcileCoreError(failure));
        }
        let (state_prime, req_o) = reconciler.reconcile_core(&cr, resp_o, state);
        resp_o = match req_o {
            Some(Request::KRequest(req)) => {
                let write = AppliedWrite::of(&req);
                let req_key = req.key();
                let resp = api_server.handle(req).await;
                if resp.is_ok() {
                    debug!(object = %log_header, request = %req_key, "request done");
                    writes.extend(write);
                }
                Some(Response::KResponse(resp))
            }
            Some(Request::EventRequest(event)) => {
                recorder.record(&object_ref, &event).await;
                Some(Response::EventRecorded)
            }
            None => None,
        };
        state = state_prime;
    }
    Ok(ReconcileOutcome::Reconciled { writes })
}

// Data is passed to reconcile and error_policy by kube-rs.
pub struct Data {
    pub reconciler: MyKindReconciler,
    pub api_server: Arc<dyn ApiServer>,
    pub recorder: Arc<dyn EventRecorder>,
    pub retry: RetryTracker,
    pub requeue_after: Duration,
}

fn key_of(mykind: &MyKind) -> Result<ObjectKey, Error> {
    let name = mykind.metadata.name.as_ref().ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let namespace = mykind
        .metadata
        .namespace
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    Ok(ObjectKey::new(namespace.clone(), name.clone()))
}

pub async fn reconcile(mykind: Arc<MyKind>, ctx: Arc<Data>) -> Result<Action, Error> {
    let key = key_of(&mykind)?;
    let outcome = reconcile_with(&key, &ctx.reconciler, ctx.api_server.as_ref(), ctx.recorder.as_ref()).await?;
    ctx.retry.on_success(&key);
    match outcome {
        ReconcileOutcome::ParentAbsent => Ok(Action::await_change()),
        ReconcileOutcome::Reconciled { writes } => {
            for write in &writes {
                debug!(mykind = %key, verb = %write.verb, kind = %write.kind, object = %write.key, "applied write");
            }
            Ok(Action::requeue(ctx.requeue_after))
        }
    }
}

// error_policy defines the controller's behavior when the reconcile ends with an error.
pub fn error_policy(mykind: Arc<MyKind>, error: &Error, ctx: Arc<Data>) -> Action {
    let key = match key_of(&mykind) {
        Ok(key) => key,
        Err(_) => {
            error!(error = %error, "reconcile failed for an object without name or namespace");
            return Action::await_change();
        }
    };
    let decision = ctx.retry.on_failure(&key);
    if decision.exhausted {
        error!(mykind = %key, attempt = decision.attempt, error = %error, "reconcile keeps failing, retry budget exhausted");
    } else {
        warn!(mykind = %key, attempt = decision.attempt, delay_ms = decision.delay.as_millis() as u64, error = %error, "reconcile failed, will retry");
    }
    Action::requeue(decision.delay)
}

// report_controller_reconciled logs the result of each reconcile run by the Controller.
// A requeued key whose MyKind vanished from the store is dropped by the Controller
// without another reconcile, so its failure count is forgotten here.
pub fn report_controller_reconciled<QueueErr>(
    controller_name: &str,
    retry: &RetryTracker,
    result: &Result<(ObjectRef<MyKind>, Action), controller::Error<Error, QueueErr>>,
) where
    QueueErr: std::error::Error,
{
    match result {
        Ok((obj, _)) => {
            info!(controller.name = controller_name, mykind = %obj, "Reconciled MyKind");
        }
        Err(controller::Error::ObjectNotFound(obj)) => {
            if let Some(namespace) = &obj.namespace {
                retry.forget(&ObjectKey::new(namespace.clone(), obj.name.clone()));
            }
            debug!(controller.name = controller_name, mykind = %obj, "MyKind gone before its requeue");
        }
        Err(err) => {
            error!(
                controller.name = controller_name,
                error = err as &dyn std::error::Error,
                "Failed to reconcile MyKind",
            );
        }
    }
}

// run_controller watches MyKinds and the Deployments they own and runs
// reconcile for every change until a termination signal arrives.
pub async fn run_controller(config: RunConfig) -> anyhow::Result<()> {
    let client = Client::try_default().await?;
    let (mykinds, deployments) = match &config.namespace {
        Some(namespace) => (
            Api::<MyKind>::namespaced(client.clone(), namespace),
            Api::<Deployment>::namespaced(client.clone(), namespace),
        ),
        None => (Api::<MyKind>::all(client.clone()), Api::<Deployment>::all(client.clone())),
    };

    let ownership_index = Arc::new(OwnershipIndex::for_owner::<MyKind>());
    let data = Arc::new(Data {
        reconciler: MyKindReconciler::new(ownership_index.clone()),
        api_server: Arc::new(KubeApiServer::new(client.clone())),
        recorder: Arc::new(KubeEventRecorder::new(client.clone(), &config.reporter)),
        retry: RetryTracker::new(config.backoff.clone()),
        requeue_after: config.requeue_after,
    });

    // The ownership index is fed by its own Deployment watch.
    let index_feed = {
        let ownership_index = ownership_index.clone();
        watcher(deployments.clone(), watcher::Config::default())
            .default_backoff()
            .for_each(move |event| {
                match event {
                    Ok(event) => ownership_index.apply_watcher_event(&event),
                    Err(err) => warn!(error = %err, "Deployment watch failed"),
                }
                futures::future::ready(())
            })
    };

    let report_data = data.clone();
    let mykind_reconciler = async move {
        // Passes only start once every existing Deployment has been attributed.
        info!("waiting for the Deployment ownership index to sync");
        tokio::select! {
            _ = ownership_index.wait_until_synced() => {},
            _ = tokio::signal::ctrl_c() => return,
        }
        info!(namespace = ?config.namespace, "starting controller");
        Controller::new(mykinds, watcher::Config::default())
            .owns(deployments, watcher::Config::default())
            .shutdown_on_signal()
            .run(reconcile, error_policy, data)
            .for_each(|res| {
                report_controller_reconciled("mykind-reconciler", &report_data.retry, &res);
                futures::future::ready(())
            })
            .await;
    };

    tokio::select! {
        _ = mykind_reconciler => {},
        _ = index_feed => warn!("Deployment watch ended"),
    }
    info!("controller terminated");
    Ok(())
}
