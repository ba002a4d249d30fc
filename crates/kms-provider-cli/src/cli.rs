use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use kms_provider::Action;

#[derive(Parser)]
#[command(name = "kms-provider", about = "Reconcile KMS keys one invocation at a time")]
pub struct Cli {
    /// Resource variant to operate on.
    #[arg(value_enum)]
    pub resource: Resource,

    /// CREATE, READ, UPDATE, DELETE or LIST (case-insensitive).
    pub action: Action,

    /// Request JSON (desiredResourceState, previousResourceState, ...).
    #[arg(short, long)]
    pub request: PathBuf,

    /// Callback context from the previous IN_PROGRESS event.
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// Provider config file.
    #[arg(long, env = "KMS_PROVIDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Region for the local client when neither the request nor the config
    /// names one.
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Resource {
    Key,
    ReplicaKey,
}
