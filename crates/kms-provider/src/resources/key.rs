//! Customer managed keys.

use kms_provider_client::{CreateKeyInput, KeyMetadata};
use kms_provider_core::models::KeyModel;
use kms_provider_core::models::key::DEFAULT_ORIGIN;
use kms_provider_core::models::tag::effective_tags;
use kms_provider_core::{CallbackContext, KmsError, ProgressEvent, PropagationPolicy, Tag};
use serde_json::Value;

use crate::handler::{ResourceHandler, ResourceHandlerRequest, suspend_on};
use crate::orchestrator::KeyOrchestrator;
use crate::resource::{
    CreatableResource, IdentifiableResource, PolicyBearingResource, TaggableResource,
};

const ROTATION_PERIOD_DAYS: std::ops::RangeInclusive<i32> = 90..=2560;
const PENDING_WINDOW_DAYS: std::ops::RangeInclusive<i32> = 7..=30;

impl IdentifiableResource for KeyModel {
    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn is_enabled(&self) -> bool {
        KeyModel::is_enabled(self)
    }

    fn set_identity(&mut self, meta: &KeyMetadata) {
        self.key_id = Some(meta.key_id.clone());
        self.arn = meta.arn.clone();
    }

    fn apply_metadata(&mut self, meta: &KeyMetadata) {
        self.set_identity(meta);
        self.description = meta.description.clone().filter(|d| !d.is_empty());
        self.enabled = Some(meta.enabled);
        self.key_spec = meta.key_spec.clone();
        self.key_usage = meta.key_usage.clone();
        self.origin = meta.origin.clone();
        self.multi_region = Some(meta.multi_region);
    }
}

impl PolicyBearingResource for KeyModel {
    fn key_policy(&self) -> Option<&Value> {
        self.key_policy.as_ref()
    }

    fn set_key_policy(&mut self, policy: Value) {
        self.key_policy = Some(policy);
    }

    fn bypass_policy_lockout_safety_check(&self) -> bool {
        self.bypass_policy_lockout_safety_check.unwrap_or(false)
    }
}

impl TaggableResource for KeyModel {
    fn tags(&self) -> Option<&[Tag]> {
        self.tags.as_deref()
    }

    fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = (!tags.is_empty()).then_some(tags);
    }
}

impl CreatableResource for KeyModel {
    fn pending_window_in_days(&self) -> Option<i32> {
        self.pending_window_in_days
    }

    fn redact_write_only(&mut self) {
        self.pending_window_in_days = None;
        self.bypass_policy_lockout_safety_check = None;
    }
}

fn validate(model: &KeyModel, operation: &str) -> Result<(), KmsError> {
    if model.is_rotation_enabled() && !model.supports_rotation() {
        return Err(KmsError::invalid_request(
            operation,
            "automatic rotation is only supported for symmetric encryption keys",
        ));
    }
    if let Some(period) = model.rotation_period_in_days {
        if !model.is_rotation_enabled() {
            return Err(KmsError::invalid_request(
                operation,
                "RotationPeriodInDays requires EnableKeyRotation",
            ));
        }
        if !ROTATION_PERIOD_DAYS.contains(&period) {
            return Err(KmsError::invalid_request(
                operation,
                format!("RotationPeriodInDays must be between 90 and 2560, got {period}"),
            ));
        }
    }
    match model.pending_window_in_days {
        Some(window) if !PENDING_WINDOW_DAYS.contains(&window) => Err(KmsError::invalid_request(
            operation,
            format!("PendingWindowInDays must be between 7 and 30, got {window}"),
        )),
        _ => Ok(()),
    }
}

/// A disabled key rejects rotation changes, so a request that changes
/// rotation without also enabling or disabling the key cannot succeed.
fn reject_rotation_change_while_disabled(
    previous: Option<&KeyModel>,
    model: &KeyModel,
    operation: &str,
) -> Result<(), KmsError> {
    let Some(previous) = previous else {
        return Ok(());
    };
    let stays_disabled = !previous.is_enabled() && !model.is_enabled();
    let rotation_changed = previous.is_rotation_enabled() != model.is_rotation_enabled()
        || previous.rotation_period_in_days != model.rotation_period_in_days;
    if stays_disabled && rotation_changed {
        return Err(KmsError::invalid_request(
            operation,
            "key rotation cannot be changed while the key is disabled",
        ));
    }
    Ok(())
}

pub struct KeyHandler {
    orchestrator: KeyOrchestrator,
}

impl KeyHandler {
    pub fn new(orchestrator: KeyOrchestrator) -> Self {
        Self { orchestrator }
    }

    async fn read_model(
        &self,
        mut model: KeyModel,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<KeyModel>, KmsError> {
        let orch = &self.orchestrator;
        orch.describe_key(&mut model, &mut context, true).await?;
        orch.read_enrichment(
            "kms:GetKeyPolicy",
            orch.get_key_policy(&mut model, &mut context).await,
        )?;
        orch.read_enrichment(
            "kms:GetKeyRotationStatus",
            orch.get_key_rotation_status(&mut model, &mut context).await,
        )?;
        orch.read_enrichment(
            "kms:ListResourceTags",
            orch.retrieve_resource_tags(&mut model, &mut context, true).await,
        )?;

        model.redact_write_only();
        Ok(ProgressEvent::success(Some(model)))
    }
}

impl ResourceHandler for KeyHandler {
    type Model = KeyModel;

    async fn create(
        &self,
        request: &ResourceHandlerRequest<KeyModel>,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<KeyModel>, KmsError> {
        const OP: &str = "kms:CreateKey";
        let mut model = request.desired(OP)?;
        validate(&model, OP)?;
        PropagationPolicy::set_request_type(&mut context, false);

        let input = CreateKeyInput {
            description: model.description.clone(),
            key_spec: model.key_spec().to_string(),
            key_usage: model.key_usage().to_string(),
            origin: model.origin.clone().unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            policy: request.creation_policy(model.key_policy.as_ref()),
            bypass_policy_lockout_safety_check: model
                .bypass_policy_lockout_safety_check
                .unwrap_or(false),
            multi_region: model.multi_region.unwrap_or(false),
            tags: effective_tags(model.tags.as_deref(), &request.desired_resource_tags)
                .into_iter()
                .collect(),
        };

        let orch = &self.orchestrator;
        suspend_on!(
            orch.create_key(&mut model, &mut context, input).await?,
            model,
            context
        );
        suspend_on!(
            orch.update_key_rotation(None, &mut model, &mut context).await?,
            model,
            context
        );
        suspend_on!(
            orch.disable_key_if_necessary(None, &mut model, &mut context).await?,
            model,
            context
        );
        suspend_on!(
            orch.propagation().wait_for_changes_to_propagate(&mut context),
            model,
            context
        );

        self.read_model(model, context).await
    }

    async fn read(
        &self,
        request: &ResourceHandlerRequest<KeyModel>,
        context: CallbackContext,
    ) -> Result<ProgressEvent<KeyModel>, KmsError> {
        let model = request.desired("kms:DescribeKey")?;
        self.read_model(model, context).await
    }

    async fn update(
        &self,
        request: &ResourceHandlerRequest<KeyModel>,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<KeyModel>, KmsError> {
        const OP: &str = "update-key";
        let mut model = request.desired(OP)?;
        let previous = request.previous_resource_state.as_ref();
        if model.key_id.is_none() {
            model.key_id = previous.and_then(|p| p.key_id.clone());
        }
        validate(&model, OP)?;
        reject_rotation_change_while_disabled(previous, &model, OP)?;
        PropagationPolicy::set_request_type(&mut context, true);

        let orch = &self.orchestrator;
        suspend_on!(
            orch.describe_key(&mut model, &mut context, false).await?,
            model,
            context
        );
        suspend_on!(
            orch.enable_key_if_necessary(previous, &mut model, &mut context, true)
                .await?,
            model,
            context
        );
        suspend_on!(
            orch.update_key_rotation(previous, &mut model, &mut context).await?,
            model,
            context
        );
        suspend_on!(
            orch.disable_key_if_necessary(previous, &mut model, &mut context)
                .await?,
            model,
            context
        );
        suspend_on!(
            orch.update_key_description(previous, &mut model, &mut context)
                .await?,
            model,
            context
        );
        suspend_on!(
            orch.update_key_policy(previous, &mut model, &mut context).await?,
            model,
            context
        );
        let desired_tags = effective_tags(model.tags.as_deref(), &request.desired_resource_tags);
        suspend_on!(
            orch.update_key_tags(&mut model, &desired_tags, &mut context)
                .await?,
            model,
            context
        );
        suspend_on!(
            orch.propagation().wait_for_changes_to_propagate(&mut context),
            model,
            context
        );

        model.redact_write_only();
        Ok(ProgressEvent::success(Some(model)))
    }

    async fn delete(
        &self,
        request: &ResourceHandlerRequest<KeyModel>,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<KeyModel>, KmsError> {
        let mut model = request.desired("kms:ScheduleKeyDeletion")?;
        // Once scheduled, describe reports the key as gone.
        if !context.deletion_scheduled {
            self.orchestrator
                .describe_key(&mut model, &mut context, false)
                .await?;
        }
        self.orchestrator.delete_key(model, context).await
    }

    async fn list(
        &self,
        request: &ResourceHandlerRequest<KeyModel>,
    ) -> Result<ProgressEvent<KeyModel>, KmsError> {
        let (keys, next_token) = self
            .orchestrator
            .list_and_filter_by_metadata(request.next_token.clone(), |meta| !meta.is_replica())
            .await?;

        let models = keys
            .iter()
            .map(|meta| {
                let mut model = KeyModel::default();
                model.set_identity(meta);
                model
            })
            .collect();
        Ok(ProgressEvent::success_list(models, next_token))
    }
}
