mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use eyre::{WrapErr, eyre};
use kms_provider::{
    KeyHandler, KeyOrchestrator, ProviderConfig, ReplicaKeyHandler, ResourceHandler,
    ResourceHandlerRequest, invoke,
};
use kms_provider_client::SdkClientFactory;
use kms_provider_core::CallbackContext;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Resource};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Logs go to stderr; stdout carries only progress events.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ProviderConfig::load(path)?,
        None => ProviderConfig::default(),
    };

    match cli.resource {
        Resource::Key => {
            let request = read_json(&cli.request)?;
            let orchestrator = build_orchestrator(&cli, &config, &request).await?;
            run(&KeyHandler::new(orchestrator), &cli, request).await
        }
        Resource::ReplicaKey => {
            let request = read_json(&cli.request)?;
            let orchestrator = build_orchestrator(&cli, &config, &request).await?;
            run(&ReplicaKeyHandler::new(orchestrator), &cli, request).await
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> eyre::Result<T> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).wrap_err_with(|| format!("invalid JSON in {}", path.display()))
}

async fn build_orchestrator<M>(
    cli: &Cli,
    config: &ProviderConfig,
    request: &ResourceHandlerRequest<M>,
) -> eyre::Result<KeyOrchestrator> {
    let region = request
        .region
        .clone()
        .or_else(|| cli.region.clone())
        .or_else(|| config.region.clone())
        .ok_or_else(|| eyre!("no region: set it in the request, the config or AWS_REGION"))?;

    tracing::info!(%region, "building KMS clients");
    let clients = SdkClientFactory::with_credentials(&region, &config.credentials).await;
    Ok(KeyOrchestrator::new(Arc::new(clients), region, config))
}

/// One invocation. An IN_PROGRESS event carries the context to pass back
/// with `--context` after its delay.
async fn run<H>(
    handler: &H,
    cli: &Cli,
    request: ResourceHandlerRequest<H::Model>,
) -> eyre::Result<()>
where
    H: ResourceHandler,
    H::Model: Serialize,
{
    let context: Option<CallbackContext> = match &cli.context {
        Some(path) => Some(read_json(path)?),
        None => None,
    };

    let event = invoke(handler, cli.action, &request, context).await;
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}
