// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use clap::Parser;
use kube::CustomResourceExt;
use mykind_controller::config::{Cli, Commands, RunConfig};
use mykind_controller::controllers::mykind_controller::types::MyKind;
use mykind_controller::shim_layer::controller_runtime::run_controller;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Export => {
            info!("exporting custom resource definition");
            println!("{}", serde_yaml::to_string(&MyKind::crd())?);
        }
        Commands::Run(args) => {
            info!("running mykind-controller");
            run_controller(RunConfig::from(args)).await?;
        }
    }
    Ok(())
}
