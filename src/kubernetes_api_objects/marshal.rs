// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::Error;
use kube::api::DynamicObject;
use serde::{de::DeserializeOwned, Serialize};

/// Converts a typed object into the DynamicObject carried by API requests.
/// The typed object must serialize its apiVersion and kind, which both
/// k8s-openapi types and kube-derived custom resources do.
pub fn marshal<K: Serialize>(obj: &K) -> Result<DynamicObject, Error> {
    let value = serde_json::to_value(obj).map_err(Error::MarshalFailed)?;
    serde_json::from_value(value).map_err(Error::MarshalFailed)
}

pub fn unmarshal<K: DeserializeOwned>(obj: DynamicObject) -> Result<K, Error> {
    let value = serde_json::to_value(obj).map_err(Error::MarshalFailed)?;
    serde_json::from_value(value).map_err(Error::MarshalFailed)
}
