//! kms-provider-core
//!
//! Pure domain types and the resumable reconciliation engine.
//! No AWS SDK dependency. This is the shared vocabulary of the provider.
//!
//! - `models` : declared/observed state of each key variant, plus tags
//! - `context` : state carried between invocations of one logical operation
//! - `event` : per-invocation outcome returned to the caller
//! - `step` : build → invoke → apply steps, retry filtering, stabilization
//! - `backoff` / `propagation` : advisory delay policies

pub mod backoff;
pub mod context;
pub mod error;
pub mod event;
pub mod models;
pub mod policy;
pub mod propagation;
pub mod step;

pub use crate::backoff::BackoffPolicy;
pub use crate::context::CallbackContext;
pub use crate::error::{ApiFailure, KmsError};
pub use crate::event::{HandlerErrorCode, OperationStatus, ProgressEvent};
pub use crate::models::tag::{Tag, TagDiff};
pub use crate::propagation::PropagationPolicy;
pub use crate::step::{Flow, Step, StepEngine};
