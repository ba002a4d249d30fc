//! Key-lifecycle sub-operations shared by every key variant.
//!
//! Each method is one resumable step of a handler: it either continues
//! (`Flow::Continue`), asks the caller to suspend (`Flow::Suspend`), or fails
//! with a translated `KmsError`. Mutating steps check their completion flag
//! in the context first, so replaying a handler from the top never repeats a
//! non-idempotent call.

use std::collections::BTreeSet;
use std::sync::Arc;

use kms_provider_client::translate::is_invalid_state;
use kms_provider_client::{
    ClientFactory, CreateKeyInput, KeyMetadata, KeyState, KmsApi, ReplicateKeyInput,
};
use kms_provider_core::models::KeyModel;
use kms_provider_core::{
    ApiFailure, CallbackContext, Flow, HandlerErrorCode, KmsError, ProgressEvent,
    PropagationPolicy, Step, StepEngine, Tag, TagDiff, policy,
};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::resource::{
    CreatableResource, IdentifiableResource, PolicyBearingResource, TaggableResource,
};

const DESCRIBE_KEY: Step = Step::new("kms:DescribeKey");
const CREATE_KEY: Step = Step::new("kms:CreateKey");
const REPLICATE_KEY: Step = Step::new("kms:ReplicateKey");
const GET_KEY_POLICY: Step = Step::new("kms:GetKeyPolicy");
const PUT_KEY_POLICY: Step = Step::new("kms:PutKeyPolicy");
const UPDATE_DESCRIPTION: Step = Step::new("kms:UpdateKeyDescription");
const ENABLE_KEY: Step = Step::new("kms:EnableKey");
// A key created moments ago may not be visible to DisableKey yet.
const DISABLE_KEY: Step = Step::new("kms:DisableKey").retry_on(KmsError::is_not_found);
const GET_ROTATION_STATUS: Step = Step::new("kms:GetKeyRotationStatus");
const ENABLE_ROTATION: Step = Step::new("kms:EnableKeyRotation");
const DISABLE_ROTATION: Step = Step::new("kms:DisableKeyRotation");
const LIST_TAGS: Step = Step::new("kms:ListResourceTags");
const TAG_RESOURCE: Step = Step::new("kms:TagResource");
const UNTAG_RESOURCE: Step = Step::new("kms:UntagResource");
const SCHEDULE_DELETION: Step = Step::new("kms:ScheduleKeyDeletion");

/// Suspend-aware sequencing inside the orchestrator.
macro_rules! proceed {
    ($flow:expr) => {
        if let flow @ Flow::Suspend(_) = $flow {
            return Ok(flow);
        }
    };
}

fn key_id_of<M: IdentifiableResource>(model: &M, operation: &str) -> Result<String, KmsError> {
    model.key_id().map(String::from).ok_or_else(|| {
        KmsError::not_found(operation, ApiFailure::message("model carries no key identifier"))
    })
}

fn pending_deletion(key_id: &str) -> KmsError {
    KmsError::not_found(
        DESCRIBE_KEY.name,
        ApiFailure::message(format!("key {key_id} is pending deletion")),
    )
}

pub struct KeyOrchestrator {
    api: Arc<dyn KmsApi>,
    clients: Arc<dyn ClientFactory>,
    region: String,
    engine: StepEngine,
    propagation: PropagationPolicy,
    list_page_size: i32,
    soft_fail_read_access_denied: bool,
}

impl KeyOrchestrator {
    pub fn new(
        clients: Arc<dyn ClientFactory>,
        region: impl Into<String>,
        config: &ProviderConfig,
    ) -> Self {
        let region = region.into();
        Self {
            api: clients.client(&region),
            clients,
            region,
            engine: config.step_engine(),
            propagation: config.propagation(),
            list_page_size: config.list_page_size,
            soft_fail_read_access_denied: config.soft_fail_read_access_denied,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn propagation(&self) -> &PropagationPolicy {
        &self.propagation
    }

    /// Client for another region, reusing the local one when they match.
    pub fn client_for(&self, region: &str) -> Arc<dyn KmsApi> {
        if region == self.region {
            Arc::clone(&self.api)
        } else {
            self.clients.client(region)
        }
    }

    /// Fetch metadata and fail with NotFound when the key is pending
    /// deletion. The model only changes when `update_model` is set.
    pub async fn describe_key<M: IdentifiableResource>(
        &self,
        model: &mut M,
        context: &mut CallbackContext,
        update_model: bool,
    ) -> Result<Flow, KmsError> {
        let key_id = key_id_of(model, DESCRIBE_KEY.name)?;
        let api = &self.api;
        self.engine
            .run(
                DESCRIBE_KEY,
                model,
                context,
                |_| key_id,
                |key_id| async move {
                    let meta = api.describe_key(key_id).await?;
                    if meta.key_state.is_pending_deletion() {
                        return Err(pending_deletion(&meta.key_id));
                    }
                    Ok(meta)
                },
                |meta, model, _| {
                    if update_model {
                        model.apply_metadata(&meta);
                    }
                },
            )
            .await
    }

    /// Create a key unless the model already carries an identifier from an
    /// earlier invocation.
    pub async fn create_key<M: IdentifiableResource>(
        &self,
        model: &mut M,
        context: &mut CallbackContext,
        input: CreateKeyInput,
    ) -> Result<Flow, KmsError> {
        if model.key_id().is_some() {
            tracing::debug!("key already created, skipping");
            return Ok(Flow::Continue);
        }
        self.engine
            .run(
                CREATE_KEY,
                model,
                context,
                |_| input,
                |input| self.api.create_key(input),
                |meta, model, _| model.set_identity(&meta),
            )
            .await
    }

    /// Replicate a multi-region primary key into this orchestrator's region.
    /// The call is issued against the primary key's region.
    pub async fn replicate_key<M: IdentifiableResource>(
        &self,
        model: &mut M,
        context: &mut CallbackContext,
        primary_region: &str,
        input: ReplicateKeyInput,
    ) -> Result<Flow, KmsError> {
        if model.key_id().is_some() {
            tracing::debug!("replica already requested, skipping");
            return Ok(Flow::Continue);
        }
        let primary = self.client_for(primary_region);
        tracing::info!(
            primary_key_arn = %input.primary_key_arn,
            primary_region,
            replica_region = %input.replica_region,
            "replicating key"
        );
        self.engine
            .run(
                REPLICATE_KEY,
                model,
                context,
                |_| input,
                |input| primary.replicate_key(input),
                |meta, model, _| model.set_identity(&meta),
            )
            .await
    }

    /// Poll describe until the key has left the creating state.
    pub async fn wait_until_created<M: IdentifiableResource>(
        &self,
        model: &M,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError> {
        let key_id = key_id_of(model, DESCRIBE_KEY.name)?;
        let api = &self.api;
        self.engine
            .stabilize("key-creation", context, async move {
                let meta = api.describe_key(key_id).await?;
                Ok(meta.key_state != KeyState::Creating)
            })
            .await
    }

    pub async fn get_key_policy<M>(
        &self,
        model: &mut M,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError>
    where
        M: IdentifiableResource + PolicyBearingResource,
    {
        let key_id = key_id_of(model, GET_KEY_POLICY.name)?;
        self.engine
            .run(
                GET_KEY_POLICY,
                model,
                context,
                |_| key_id,
                |key_id| self.api.get_key_policy(key_id),
                |document, model, _| {
                    model.set_key_policy(policy::normalize(&Value::String(document)))
                },
            )
            .await
    }

    pub async fn update_key_description<M: IdentifiableResource>(
        &self,
        previous: Option<&M>,
        model: &mut M,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError> {
        if context.description_updated {
            return Ok(Flow::Continue);
        }
        if previous.and_then(|p| p.description()) == model.description() {
            tracing::debug!("description unchanged");
            return Ok(Flow::Continue);
        }
        let key_id = key_id_of(model, UPDATE_DESCRIPTION.name)?;
        let description = model.description().unwrap_or_default().to_string();
        tracing::info!(key_id, "updating key description");
        self.engine
            .run(
                UPDATE_DESCRIPTION,
                model,
                context,
                |_| (key_id, description),
                |(key_id, description)| self.api.update_key_description(key_id, description),
                |_, _, context| context.description_updated = true,
            )
            .await
    }

    /// Put the declared policy when it differs from the previous one.
    ///
    /// Suspends for the update propagation delay after the put: a new policy
    /// may grant permissions that later steps (tagging) depend on.
    pub async fn update_key_policy<M>(
        &self,
        previous: Option<&M>,
        model: &mut M,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError>
    where
        M: IdentifiableResource + PolicyBearingResource,
    {
        if context.policy_updated {
            tracing::debug!("policy already updated in this operation");
            return Ok(Flow::Continue);
        }
        let desired = model.key_policy();
        if !policy::differs(previous.and_then(|p| p.key_policy()), desired) {
            tracing::debug!("policy unchanged");
            return Ok(Flow::Continue);
        }
        // A key always has a policy; dropping it from the model is not a change.
        let Some(document) = desired.map(policy::to_document) else {
            return Ok(Flow::Continue);
        };

        let key_id = key_id_of(model, PUT_KEY_POLICY.name)?;
        let bypass = model.bypass_policy_lockout_safety_check();
        tracing::info!(key_id, "updating key policy");
        proceed!(
            self.engine
                .run(
                    PUT_KEY_POLICY,
                    model,
                    context,
                    |_| (key_id, document),
                    |(key_id, document)| self.api.put_key_policy(key_id, document, bypass),
                    |_, _, context| context.policy_updated = true,
                )
                .await?
        );

        let delay = self.propagation.update_delay;
        tracing::info!(
            delay_seconds = delay.as_secs(),
            "waiting for policy to propagate"
        );
        Ok(Flow::Suspend(delay))
    }

    /// Enable a key that is moving from disabled to enabled, at most once
    /// per operation. With `use_delay` the caller waits for propagation
    /// before any further mutation.
    pub async fn enable_key_if_necessary<M: IdentifiableResource>(
        &self,
        previous: Option<&M>,
        model: &mut M,
        context: &mut CallbackContext,
        use_delay: bool,
    ) -> Result<Flow, KmsError> {
        let was_enabled = previous.is_none_or(|p| p.is_enabled());
        if was_enabled || !model.is_enabled() || context.key_enabled {
            return Ok(Flow::Continue);
        }

        let key_id = key_id_of(model, ENABLE_KEY.name)?;
        tracing::info!(key_id, "enabling key");
        proceed!(
            self.engine
                .run(
                    ENABLE_KEY,
                    model,
                    context,
                    |_| key_id,
                    |key_id| self.api.enable_key(key_id),
                    |_, _, context| context.key_enabled = true,
                )
                .await?
        );

        if use_delay {
            let delay = self.propagation.update_delay;
            tracing::info!(delay_seconds = delay.as_secs(), "waiting for enable to propagate");
            return Ok(Flow::Suspend(delay));
        }
        Ok(Flow::Continue)
    }

    /// Disable a key that is moving from enabled to disabled. NotFound is
    /// retried with backoff; every other error propagates.
    pub async fn disable_key_if_necessary<M: IdentifiableResource>(
        &self,
        previous: Option<&M>,
        model: &mut M,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError> {
        let was_enabled = previous.is_none_or(|p| p.is_enabled());
        if !was_enabled || model.is_enabled() || context.key_disabled {
            return Ok(Flow::Continue);
        }

        let key_id = key_id_of(model, DISABLE_KEY.name)?;
        tracing::info!(key_id, attempt = context.retry_attempts, "disabling key");
        self.engine
            .run(
                DISABLE_KEY,
                model,
                context,
                |_| key_id,
                |key_id| self.api.disable_key(key_id),
                |_, _, context| context.key_disabled = true,
            )
            .await
    }

    pub async fn get_key_rotation_status(
        &self,
        model: &mut KeyModel,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError> {
        if !model.supports_rotation() {
            return Ok(Flow::Continue);
        }
        let key_id = key_id_of(model, GET_ROTATION_STATUS.name)?;
        self.engine
            .run(
                GET_ROTATION_STATUS,
                model,
                context,
                |_| key_id,
                |key_id| self.api.get_key_rotation_status(key_id),
                |status, model, _| {
                    model.enable_key_rotation = Some(status.enabled);
                    model.rotation_period_in_days = status.rotation_period_in_days;
                },
            )
            .await
    }

    /// Toggle automatic rotation (or change its period), at most once per
    /// operation.
    pub async fn update_key_rotation(
        &self,
        previous: Option<&KeyModel>,
        model: &mut KeyModel,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError> {
        if context.rotation_updated {
            tracing::debug!("rotation already updated in this operation");
            return Ok(Flow::Continue);
        }
        let was_enabled = previous.is_some_and(KeyModel::is_rotation_enabled);
        let previous_period = previous.and_then(|p| p.rotation_period_in_days);
        let enable = model.is_rotation_enabled();
        let period = model.rotation_period_in_days;
        if was_enabled == enable && (!enable || previous_period == period) {
            tracing::debug!("rotation unchanged");
            return Ok(Flow::Continue);
        }

        let key_id = key_id_of(model, ENABLE_ROTATION.name)?;
        tracing::info!(key_id, enable, rotation_period_in_days = ?period, "updating key rotation");
        if enable {
            self.engine
                .run(
                    ENABLE_ROTATION,
                    model,
                    context,
                    |_| (key_id, period),
                    |(key_id, period)| self.api.enable_key_rotation(key_id, period),
                    |_, _, context| context.rotation_updated = true,
                )
                .await
        } else {
            self.engine
                .run(
                    DISABLE_ROTATION,
                    model,
                    context,
                    |_| key_id,
                    |key_id| self.api.disable_key_rotation(key_id),
                    |_, _, context| context.rotation_updated = true,
                )
                .await
        }
    }

    /// List every tag page into `context.existing_tags`.
    ///
    /// All pages are read within this one invocation; the cursor lives in the
    /// context only so a failed invocation can resume mid-listing.
    pub async fn retrieve_resource_tags<M>(
        &self,
        model: &mut M,
        context: &mut CallbackContext,
        update_model: bool,
    ) -> Result<Flow, KmsError>
    where
        M: IdentifiableResource + TaggableResource,
    {
        if !context.tags_retrieved {
            let key_id = key_id_of(model, LIST_TAGS.name)?;
            loop {
                let cursor = context.tag_cursor.clone();
                proceed!(
                    self.engine
                        .run(
                            LIST_TAGS,
                            model,
                            context,
                            |_| (key_id.clone(), cursor),
                            |(key_id, cursor)| self.api.list_resource_tags(key_id, cursor),
                            |page, _, context| {
                                context.existing_tags.extend(page.items);
                                context.tag_cursor = page.next_marker;
                            },
                        )
                        .await?
                );
                if context.tag_cursor.is_none() {
                    break;
                }
                tracing::debug!(key_id, "fetching next tag page");
            }
            context.tags_retrieved = true;
        }

        if update_model {
            model.set_tags(context.existing_tags.iter().cloned().collect());
        }
        Ok(Flow::Continue)
    }

    /// Move the remote tag set to `desired`: untag what is gone, then tag
    /// what is new. The context tracks the remote set as each call lands.
    pub async fn update_key_tags<M>(
        &self,
        model: &mut M,
        desired: &BTreeSet<Tag>,
        context: &mut CallbackContext,
    ) -> Result<Flow, KmsError>
    where
        M: IdentifiableResource + TaggableResource,
    {
        proceed!(self.retrieve_resource_tags(model, context, false).await?);

        let diff = TagDiff::between(&context.existing_tags, desired);
        if diff.is_empty() {
            tracing::debug!("tags unchanged");
            return Ok(Flow::Continue);
        }
        let key_id = key_id_of(model, TAG_RESOURCE.name)?;

        if !diff.to_remove.is_empty() {
            let removed = diff.to_remove.clone();
            tracing::info!(key_id, count = removed.len(), "removing tags");
            proceed!(
                self.engine
                    .run(
                        UNTAG_RESOURCE,
                        model,
                        context,
                        |_| (key_id.clone(), diff.keys_to_remove()),
                        |(key_id, keys)| self.api.untag_resource(key_id, keys),
                        move |_, _, context| {
                            for tag in &removed {
                                context.existing_tags.remove(tag);
                            }
                        },
                    )
                    .await?
            );
        }

        if !diff.to_add.is_empty() {
            let added = diff.to_add;
            tracing::info!(key_id, count = added.len(), "adding tags");
            proceed!(
                self.engine
                    .run(
                        TAG_RESOURCE,
                        model,
                        context,
                        |_| (key_id.clone(), added.iter().cloned().collect::<Vec<_>>()),
                        |(key_id, tags)| self.api.tag_resource(key_id, tags),
                        |_, _, context| context.existing_tags.extend(added.iter().cloned()),
                    )
                    .await?
            );
        }

        Ok(Flow::Continue)
    }

    /// Schedule deletion, wait for a deletion-pending state, then wait for
    /// propagation.
    ///
    /// A key already in a state that forbids scheduling deletion is reported
    /// as a NotFound failure instead of an error.
    pub async fn delete_key<M>(
        &self,
        mut model: M,
        mut context: CallbackContext,
    ) -> Result<ProgressEvent<M>, KmsError>
    where
        M: IdentifiableResource + CreatableResource,
    {
        let key_id = key_id_of(&model, SCHEDULE_DELETION.name)?;

        if !context.deletion_scheduled {
            let window = model.pending_window_in_days();
            tracing::info!(key_id, pending_window_in_days = ?window, "scheduling key deletion");
            let scheduled = self
                .engine
                .run(
                    SCHEDULE_DELETION,
                    &mut model,
                    &mut context,
                    |_| (key_id.clone(), window),
                    |(key_id, window)| self.api.schedule_key_deletion(key_id, window),
                    |_, _, context| context.deletion_scheduled = true,
                )
                .await;
            match scheduled {
                Err(err) if is_invalid_state(&err) => {
                    tracing::info!(
                        key_id,
                        error = %err,
                        "key cannot be scheduled for deletion, treating as gone"
                    );
                    return Ok(ProgressEvent::failed(
                        HandlerErrorCode::NotFound,
                        err.to_string(),
                    ));
                }
                other => {
                    other?;
                }
            }
        }

        let api = &self.api;
        let check_id = key_id.clone();
        let flow = self
            .engine
            .stabilize("key-deletion", &mut context, async move {
                match api.describe_key(check_id).await {
                    Ok(meta) => Ok(meta.key_state.is_pending_deletion()),
                    Err(err) if err.is_not_found() => Ok(true),
                    Err(err) => Err(err),
                }
            })
            .await?;
        if let Flow::Suspend(delay) = flow {
            return Ok(ProgressEvent::in_progress(model, context, delay));
        }

        PropagationPolicy::set_request_type(&mut context, false);
        if let Flow::Suspend(delay) = self.propagation.wait_for_changes_to_propagate(&mut context) {
            return Ok(ProgressEvent::in_progress(model, context, delay));
        }

        tracing::info!(key_id, "key deletion complete");
        Ok(ProgressEvent::success(None))
    }

    /// One page of keys, described one by one and filtered by `predicate`.
    /// Keys pending deletion and keys not managed by the customer are
    /// always skipped.
    pub async fn list_and_filter_by_metadata(
        &self,
        cursor: Option<String>,
        predicate: impl Fn(&KeyMetadata) -> bool,
    ) -> Result<(Vec<KeyMetadata>, Option<String>), KmsError> {
        let page = self.api.list_keys(cursor, self.list_page_size).await?;
        tracing::debug!(count = page.items.len(), more = page.next_marker.is_some(), "listed keys");

        let mut matched = Vec::new();
        for entry in page.items {
            let meta = match self.api.describe_key(entry.key_id.clone()).await {
                Ok(meta) => meta,
                // Deleted between list and describe.
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            if meta.key_state.is_pending_deletion() || !meta.is_customer_managed() {
                continue;
            }
            if predicate(&meta) {
                matched.push(meta);
            }
        }
        Ok((matched, page.next_marker))
    }

    /// Swallow AccessDenied from a read-only enrichment when configured to.
    pub fn read_enrichment(
        &self,
        step: &str,
        result: Result<Flow, KmsError>,
    ) -> Result<Flow, KmsError> {
        match result {
            Err(err) if self.soft_fail_read_access_denied && err.is_access_denied() => {
                tracing::warn!(
                    step,
                    error = %err,
                    "access denied on read, continuing with partial data"
                );
                Ok(Flow::Continue)
            }
            other => other,
        }
    }
}
