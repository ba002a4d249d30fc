use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kms_provider_core::{CallbackContext, KmsError, ProgressEvent, policy};
use serde::{Deserialize, Serialize};

const DEFAULT_PARTITION: &str = "aws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::List => "LIST",
        };
        f.write_str(name)
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// Everything one invocation receives besides the callback context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHandlerRequest<M> {
    #[serde(default)]
    pub desired_resource_state: Option<M>,
    #[serde(default)]
    pub previous_resource_state: Option<M>,
    /// Stack-level tags; merged under the model's own tags.
    #[serde(default)]
    pub desired_resource_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub previous_resource_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub aws_account_id: String,
    #[serde(default = "default_partition")]
    pub aws_partition: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

impl<M> ResourceHandlerRequest<M> {
    pub fn new(desired: M) -> Self {
        Self {
            desired_resource_state: Some(desired),
            previous_resource_state: None,
            desired_resource_tags: BTreeMap::new(),
            previous_resource_tags: BTreeMap::new(),
            aws_account_id: String::new(),
            aws_partition: default_partition(),
            region: None,
            next_token: None,
        }
    }

    pub fn with_previous(mut self, previous: M) -> Self {
        self.previous_resource_state = Some(previous);
        self
    }

    /// Policy document to create a key with: the declared one, else the
    /// account-root default. Without an account id there is nothing to
    /// build the default from and the service attaches its own.
    pub fn creation_policy(&self, declared: Option<&serde_json::Value>) -> Option<String> {
        match declared {
            Some(declared) => Some(policy::to_document(declared)),
            None if !self.aws_account_id.is_empty() => Some(policy::to_document(
                &policy::default_key_policy(&self.aws_partition, &self.aws_account_id),
            )),
            None => None,
        }
    }
}

impl<M: Clone> ResourceHandlerRequest<M> {
    /// The desired model, or InvalidRequest when the request has none.
    pub fn desired(&self, operation: &str) -> Result<M, KmsError> {
        self.desired_resource_state.clone().ok_or_else(|| {
            KmsError::invalid_request(operation, "request has no desired resource state")
        })
    }
}

/// One handler per resource variant.
///
/// Handlers return `Err` for failures that escape every step; [`invoke`]
/// turns those into FAILED events. A handler may also return a FAILED event
/// directly when it decides the failure is an outcome rather than an error.
#[allow(async_fn_in_trait)]
pub trait ResourceHandler {
    type Model;

    async fn create(
        &self,
        request: &ResourceHandlerRequest<Self::Model>,
        context: CallbackContext,
    ) -> Result<ProgressEvent<Self::Model>, KmsError>;

    async fn read(
        &self,
        request: &ResourceHandlerRequest<Self::Model>,
        context: CallbackContext,
    ) -> Result<ProgressEvent<Self::Model>, KmsError>;

    async fn update(
        &self,
        request: &ResourceHandlerRequest<Self::Model>,
        context: CallbackContext,
    ) -> Result<ProgressEvent<Self::Model>, KmsError>;

    async fn delete(
        &self,
        request: &ResourceHandlerRequest<Self::Model>,
        context: CallbackContext,
    ) -> Result<ProgressEvent<Self::Model>, KmsError>;

    async fn list(
        &self,
        request: &ResourceHandlerRequest<Self::Model>,
    ) -> Result<ProgressEvent<Self::Model>, KmsError>;
}

/// Run one invocation. A missing context starts a fresh logical operation.
pub async fn invoke<H: ResourceHandler>(
    handler: &H,
    action: Action,
    request: &ResourceHandlerRequest<H::Model>,
    context: Option<CallbackContext>,
) -> ProgressEvent<H::Model> {
    let context = context.unwrap_or_default();
    let result = match action {
        Action::Create => handler.create(request, context).await,
        Action::Read => handler.read(request, context).await,
        Action::Update => handler.update(request, context).await,
        Action::Delete => handler.delete(request, context).await,
        Action::List => handler.list(request).await,
    };

    match result {
        Ok(event) => {
            tracing::info!(
                %action,
                status = ?event.status,
                delay_seconds = event.callback_delay_seconds,
                "invocation finished"
            );
            event
        }
        Err(err) => {
            tracing::error!(
                %action,
                code = ?err.code(),
                operation = err.operation(),
                error = %err,
                "invocation failed"
            );
            ProgressEvent::from_error(&err)
        }
    }
}

/// Return IN_PROGRESS from the enclosing handler when a step suspends.
macro_rules! suspend_on {
    ($flow:expr, $model:expr, $context:expr) => {
        let flow: kms_provider_core::Flow = $flow;
        if let kms_provider_core::Flow::Suspend(delay) = flow {
            return Ok(kms_provider_core::ProgressEvent::in_progress(
                $model, $context, delay,
            ));
        }
    };
}

pub(crate) use suspend_on;
