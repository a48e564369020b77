// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::reconciler::reconciler::ReconcileFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MyKindReconcileStep {
    Init,
    // Waiting for the deletion of the named stale Deployment.
    AfterDeleteStaleDeployment(String),
    AfterRecordDeleted,
    AfterGetDeployment,
    AfterCreateDeployment(String),
    // Waiting for the replica update of the named Deployment to the given count.
    AfterScaleDeployment(String, i32),
    AfterUpdateStatus,
    Done,
    Error(ReconcileFailure),
}
