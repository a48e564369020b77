// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod ownership_index;
pub mod reconciler;
pub mod resource_builder;
pub mod step;
pub mod types;
