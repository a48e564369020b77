// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REPLICAS: i32 = 1;

pub const CHILD_NAME_MAX_LENGTH: usize = 64;

/// MyKindSpec defines the desired state of MyKind.
#[derive(CustomResource, Default, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(group = "mygroup.k8s.io", version = "v1beta1", kind = "MyKind")]
#[kube(shortname = "mk", namespaced)]
#[kube(status = "MyKindStatus")]
pub struct MyKindSpec {
    /// Name of the Deployment the controller manages for this MyKind.
    #[serde(rename = "childName")]
    #[schemars(length(min = 1, max = 64))]
    pub child_name: String,

    /// Replica count of the managed Deployment. One replica when not specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub replicas: Option<i32>,
}

/// MyKindStatus defines the observed state of MyKind.
#[derive(Default, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MyKindStatus {
    /// Number of ready replicas observed on the managed Deployment.
    #[serde(rename = "readyReplicas", default)]
    #[schemars(range(min = 0))]
    pub ready_replicas: i32,
}

impl MyKind {
    pub fn expected_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    pub fn ready_replicas(&self) -> i32 {
        self.status.as_ref().map_or(0, |status| status.ready_replicas)
    }

    /// Checks the constraints the CRD schema is supposed to enforce,
    /// so that objects stored before the schema existed are caught too.
    pub fn state_validation(&self) -> Result<(), String> {
        if self.spec.child_name.is_empty() {
            return Err("spec.childName must not be empty".to_string());
        }
        if self.spec.child_name.len() > CHILD_NAME_MAX_LENGTH {
            return Err(format!(
                "spec.childName must be at most {} characters",
                CHILD_NAME_MAX_LENGTH
            ));
        }
        if let Some(replicas) = self.spec.replicas {
            if replicas < 0 {
                return Err(format!("spec.replicas must be non-negative, got {}", replicas));
            }
        }
        Ok(())
    }
}
