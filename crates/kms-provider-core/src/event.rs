use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::CallbackContext;
use crate::error::KmsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    InProgress,
    Success,
    Failed,
}

/// Error classification attached to a FAILED outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerErrorCode {
    NotFound,
    AlreadyExists,
    InvalidRequest,
    ServiceLimitExceeded,
    InternalFailure,
    ServiceInternalError,
    AccessDenied,
    Throttling,
    GeneralServiceException,
    NotStabilized,
}

/// The result of one invocation.
///
/// IN_PROGRESS events carry the context to persist and the advisory resume
/// delay. Terminal events (SUCCESS / FAILED) never carry a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent<M> {
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_model: Option<M>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_models: Option<Vec<M>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_context: Option<CallbackContext>,
    #[serde(default)]
    pub callback_delay_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<HandlerErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<M> ProgressEvent<M> {
    /// Suspend: the caller persists `context` and re-invokes after `delay`.
    ///
    /// Sub-second delays round up so the caller never resumes early.
    pub fn in_progress(model: M, context: CallbackContext, delay: Duration) -> Self {
        Self {
            status: OperationStatus::InProgress,
            resource_model: Some(model),
            resource_models: None,
            callback_context: Some(context),
            callback_delay_seconds: delay_seconds(delay),
            next_token: None,
            error_code: None,
            message: None,
        }
    }

    pub fn success(model: Option<M>) -> Self {
        Self {
            status: OperationStatus::Success,
            resource_model: model,
            resource_models: None,
            callback_context: None,
            callback_delay_seconds: 0,
            next_token: None,
            error_code: None,
            message: None,
        }
    }

    pub fn success_list(models: Vec<M>, next_token: Option<String>) -> Self {
        Self {
            status: OperationStatus::Success,
            resource_model: None,
            resource_models: Some(models),
            callback_context: None,
            callback_delay_seconds: 0,
            next_token,
            error_code: None,
            message: None,
        }
    }

    pub fn failed(code: HandlerErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            resource_model: None,
            resource_models: None,
            callback_context: None,
            callback_delay_seconds: 0,
            next_token: None,
            error_code: Some(code),
            message: Some(message.into()),
        }
    }

    pub fn from_error(err: &KmsError) -> Self {
        Self::failed(err.code(), err.to_string())
    }

    pub fn is_terminal(&self) -> bool {
        self.status != OperationStatus::InProgress
    }
}

fn delay_seconds(delay: Duration) -> u32 {
    let secs = delay.as_secs_f64().ceil();
    if secs >= u32::MAX as f64 {
        u32::MAX
    } else {
        secs as u32
    }
}
