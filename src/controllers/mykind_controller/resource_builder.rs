// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controllers::mykind_controller::types::MyKind;
use crate::Error;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::api::ApiResource;
use kube::Resource;
use std::collections::BTreeMap;

pub const DEPLOYMENT_NAME_LABEL: &str = "example-controller.jetstack.io/deployment-name";

pub fn deployment_api_resource() -> ApiResource {
    ApiResource::erase::<Deployment>(&())
}

pub fn mykind_api_resource() -> ApiResource {
    ApiResource::erase::<MyKind>(&())
}

// The selector is keyed on the Deployment name, so two MyKinds managing
// differently named Deployments never select each other's pods.
pub fn make_labels(deployment_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(DEPLOYMENT_NAME_LABEL.to_string(), deployment_name.to_string())])
}

/// Builds the Deployment that mykind wants to exist.
///
/// The result depends only on mykind, so the reconciler can rebuild it on
/// every pass instead of remembering what it created.
pub fn make_deployment(mykind: &MyKind) -> Result<Deployment, Error> {
    let namespace = mykind
        .metadata
        .namespace
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    if mykind.metadata.name.is_none() {
        return Err(Error::MissingObjectKey(".metadata.name"));
    }
    let owner_ref = OwnerReference {
        block_owner_deletion: Some(true),
        ..mykind
            .controller_owner_ref(&())
            .ok_or(Error::MissingObjectKey(".metadata.uid"))?
    };
    let deployment_name = &mykind.spec.child_name;
    let labels = make_labels(deployment_name);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name.clone()),
            namespace: Some(namespace.clone()),
            owner_references: Some(vec![owner_ref]),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(mykind.expected_replicas()),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "nginx".to_string(),
                        image: Some("nginx:latest".to_string()),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}
