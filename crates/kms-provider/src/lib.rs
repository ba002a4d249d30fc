//! kms-provider
//!
//! Create/read/update/delete/list handlers for KMS keys and multi-region
//! replica keys. Each handler runs one invocation of a logical operation and
//! either finishes or hands back a context plus a resume delay; waiting and
//! re-invoking is the caller's job.

pub mod config;
pub mod handler;
pub mod orchestrator;
pub mod resource;
pub mod resources;

pub use crate::config::{ConfigError, ProviderConfig};
pub use crate::handler::{Action, ResourceHandler, ResourceHandlerRequest, invoke};
pub use crate::orchestrator::KeyOrchestrator;
pub use crate::resources::key::KeyHandler;
pub use crate::resources::replica_key::ReplicaKeyHandler;
