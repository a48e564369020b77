// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::shim_layer::backoff::ExponentialBackoff;
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mykind-controller")]
#[command(about = "Keeps one Deployment in line with each MyKind resource")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the MyKind custom resource definition as YAML
    Export,
    /// Run the controller against the cluster of the current kubeconfig
    Run(RunArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Only watch this namespace (all namespaces when absent)
    #[arg(long, env = "MYKIND_NAMESPACE")]
    pub namespace: Option<String>,

    /// Periodic resync interval after a successful pass
    #[arg(long, env = "MYKIND_REQUEUE_AFTER_SECS", default_value_t = 60)]
    pub requeue_after_secs: u64,

    /// Delay after the first failure of a key
    #[arg(long, env = "MYKIND_BACKOFF_BASE_MS", default_value_t = 500)]
    pub backoff_base_ms: u64,

    /// Upper bound of the retry delay
    #[arg(long, env = "MYKIND_BACKOFF_MAX_SECS", default_value_t = 300)]
    pub backoff_max_secs: u64,

    /// Consecutive failures of a key before they are reported as errors
    #[arg(long, env = "MYKIND_MAX_RETRIES", default_value_t = 10)]
    pub max_retries: u32,

    /// Controller name that events are reported under
    #[arg(long, env = "MYKIND_REPORTER", default_value = "mykind-controller")]
    pub reporter: String,
}

/// RunConfig is what run_controller needs, resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub namespace: Option<String>,
    pub requeue_after: Duration,
    pub backoff: ExponentialBackoff,
    pub reporter: String,
}

impl From<RunArgs> for RunConfig {
    fn from(args: RunArgs) -> RunConfig {
        RunConfig {
            namespace: args.namespace,
            requeue_after: Duration::from_secs(args.requeue_after_secs),
            backoff: ExponentialBackoff {
                base: Duration::from_millis(args.backoff_base_ms),
                max: Duration::from_secs(args.backoff_max_secs),
                max_attempts: args.max_retries,
                ..ExponentialBackoff::default()
            },
            reporter: args.reporter,
        }
    }
}
