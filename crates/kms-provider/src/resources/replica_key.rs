//! Multi-region replica keys. Rotation belongs to the primary key, so none
//! of these handlers touch it.

use kms_provider_client::{KeyMetadata, ReplicateKeyInput};
use kms_provider_core::models::ReplicaKeyModel;
use kms_provider_core::models::tag::effective_tags;
use kms_provider_core::{CallbackContext, KmsError, ProgressEvent, PropagationPolicy, Tag};
use serde_json::Value;

use crate::handler::{ResourceHandler, ResourceHandlerRequest, suspend_on};
use crate::orchestrator::KeyOrchestrator;
use crate::resource::{
    CreatableResource, IdentifiableResource, PolicyBearingResource, TaggableResource,
};

impl IdentifiableResource for ReplicaKeyModel {
    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn is_enabled(&self) -> bool {
        ReplicaKeyModel::is_enabled(self)
    }

    fn set_identity(&mut self, meta: &KeyMetadata) {
        self.key_id = Some(meta.key_id.clone());
        self.arn = meta.arn.clone();
    }

    fn apply_metadata(&mut self, meta: &KeyMetadata) {
        self.set_identity(meta);
        self.description = meta.description.clone().filter(|d| !d.is_empty());
        self.enabled = Some(meta.enabled);
        if meta.primary_key_arn.is_some() {
            self.primary_key_arn = meta.primary_key_arn.clone();
        }
    }
}

impl PolicyBearingResource for ReplicaKeyModel {
    fn key_policy(&self) -> Option<&Value> {
        self.key_policy.as_ref()
    }

    fn set_key_policy(&mut self, policy: Value) {
        self.key_policy = Some(policy);
    }
}

impl TaggableResource for ReplicaKeyModel {
    fn tags(&self) -> Option<&[Tag]> {
        self.tags.as_deref()
    }

    fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = (!tags.is_empty()).then_some(tags);
    }
}

impl CreatableResource for ReplicaKeyModel {
    fn pending_window_in_days(&self) -> Option<i32> {
        self.pending_window_in_days
    }

    fn redact_write_only(&mut self) {
        self.pending_window_in_days = None;
    }
}

pub struct ReplicaKeyHandler {
    orchestrator: KeyOrchestrator,
}

impl ReplicaKeyHandler {
    pub fn new(orchestrator: KeyOrchestrator) -> Self {
        Self { orchestrator }
    }

    async fn read_model(
        &self,
        mut model: ReplicaKeyModel,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<ReplicaKeyModel>, KmsError> {
        let orch = &self.orchestrator;
        orch.describe_key(&mut model, &mut context, true).await?;
        orch.read_enrichment(
            "kms:GetKeyPolicy",
            orch.get_key_policy(&mut model, &mut context).await,
        )?;
        orch.read_enrichment(
            "kms:ListResourceTags",
            orch.retrieve_resource_tags(&mut model, &mut context, true).await,
        )?;

        model.redact_write_only();
        Ok(ProgressEvent::success(Some(model)))
    }

    /// The replica lives in the orchestrator's region: every follow-up call
    /// (polling, disable, read-back) goes through that region's client.
    fn replicate_input(
        &self,
        request: &ResourceHandlerRequest<ReplicaKeyModel>,
        model: &ReplicaKeyModel,
        primary_key_arn: String,
    ) -> Result<ReplicateKeyInput, KmsError> {
        let replica_region = self.orchestrator.region();
        let conflicting = request
            .region
            .as_deref()
            .filter(|requested| *requested != replica_region);
        if let Some(requested) = conflicting {
            return Err(KmsError::invalid_request(
                "kms:ReplicateKey",
                format!("region {requested} differs from provider region {replica_region}"),
            ));
        }
        Ok(ReplicateKeyInput {
            primary_key_arn,
            replica_region: replica_region.to_string(),
            description: model.description.clone(),
            policy: request.creation_policy(model.key_policy.as_ref()),
            bypass_policy_lockout_safety_check: false,
            tags: effective_tags(model.tags.as_deref(), &request.desired_resource_tags)
                .into_iter()
                .collect(),
        })
    }
}

impl ResourceHandler for ReplicaKeyHandler {
    type Model = ReplicaKeyModel;

    async fn create(
        &self,
        request: &ResourceHandlerRequest<ReplicaKeyModel>,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<ReplicaKeyModel>, KmsError> {
        const OP: &str = "kms:ReplicateKey";
        let mut model = request.desired(OP)?;
        PropagationPolicy::set_request_type(&mut context, false);

        let primary_key_arn = model
            .primary_key_arn
            .clone()
            .ok_or_else(|| KmsError::invalid_request(OP, "PrimaryKeyArn is required"))?;
        let primary_region = model
            .primary_region()
            .map(String::from)
            .ok_or_else(|| {
                KmsError::invalid_request(OP, format!("malformed PrimaryKeyArn: {primary_key_arn}"))
            })?;
        let input = self.replicate_input(request, &model, primary_key_arn)?;

        let orch = &self.orchestrator;
        suspend_on!(
            orch.replicate_key(&mut model, &mut context, &primary_region, input)
                .await?,
            model,
            context
        );
        suspend_on!(
            orch.wait_until_created(&model, &mut context).await?,
            model,
            context
        );
        suspend_on!(
            orch.disable_key_if_necessary(None, &mut model, &mut context)
                .await?,
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
        request: &ResourceHandlerRequest<ReplicaKeyModel>,
        context: CallbackContext,
    ) -> Result<ProgressEvent<ReplicaKeyModel>, KmsError> {
        let model = request.desired("kms:DescribeKey")?;
        self.read_model(model, context).await
    }

    async fn update(
        &self,
        request: &ResourceHandlerRequest<ReplicaKeyModel>,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<ReplicaKeyModel>, KmsError> {
        let mut model = request.desired("update-replica-key")?;
        let previous = request.previous_resource_state.as_ref();
        if model.key_id.is_none() {
            model.key_id = previous.and_then(|p| p.key_id.clone());
        }
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
        request: &ResourceHandlerRequest<ReplicaKeyModel>,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<ReplicaKeyModel>, KmsError> {
        let mut model = request.desired("kms:ScheduleKeyDeletion")?;
        if !context.deletion_scheduled {
            self.orchestrator
                .describe_key(&mut model, &mut context, false)
                .await?;
        }
        self.orchestrator.delete_key(model, context).await
    }

    async fn list(
        &self,
        request: &ResourceHandlerRequest<ReplicaKeyModel>,
    ) -> Result<ProgressEvent<ReplicaKeyModel>, KmsError> {
        let (keys, next_token) = self
            .orchestrator
            .list_and_filter_by_metadata(request.next_token.clone(), KeyMetadata::is_replica)
            .await?;

        let models = keys
            .iter()
            .map(|meta| ReplicaKeyModel {
                key_id: Some(meta.key_id.clone()),
                arn: meta.arn.clone(),
                primary_key_arn: meta.primary_key_arn.clone(),
                ..Default::default()
            })
            .collect();
        Ok(ProgressEvent::success_list(models, next_token))
    }
}
