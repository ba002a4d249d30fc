#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use kms_provider::{
    Action, KeyOrchestrator, ProviderConfig, ResourceHandler, ResourceHandlerRequest, invoke,
};
use kms_provider_client::{
    BoxFuture, ClientFactory, CreateKeyInput, KeyListEntry, KeyMetadata, KeyState, KmsApi,
    MultiRegionKeyType, Page, ReplicateKeyInput, RotationStatus,
};
use kms_provider_core::{ApiFailure, HandlerErrorCode, KmsError, ProgressEvent, Tag};

pub const REGION: &str = "us-east-1";
pub const ACCOUNT_ID: &str = "111122223333";
pub const KEY_ID: &str = "key-1";

const MUTATIONS: &[&str] = &[
    "CreateKey",
    "ReplicateKey",
    "ScheduleKeyDeletion",
    "EnableKey",
    "DisableKey",
    "EnableKeyRotation",
    "DisableKeyRotation",
    "PutKeyPolicy",
    "TagResource",
    "UntagResource",
    "UpdateKeyDescription",
];

pub fn arn(region: &str, key_id: &str) -> String {
    format!("arn:aws:kms:{region}:{ACCOUNT_ID}:key/{key_id}")
}

pub fn metadata(key_id: &str, state: KeyState) -> KeyMetadata {
    KeyMetadata {
        arn: Some(arn(REGION, key_id)),
        key_spec: Some("SYMMETRIC_DEFAULT".into()),
        key_usage: Some("ENCRYPT_DECRYPT".into()),
        origin: Some("AWS_KMS".into()),
        key_manager: Some("CUSTOMER".into()),
        ..KeyMetadata::new(key_id, state)
    }
}

pub fn replica_metadata(key_id: &str, state: KeyState, primary_key_arn: &str) -> KeyMetadata {
    KeyMetadata {
        multi_region: true,
        multi_region_key_type: Some(MultiRegionKeyType::Replica),
        primary_key_arn: Some(primary_key_arn.to_string()),
        ..metadata(key_id, state)
    }
}

pub fn not_found(operation: &str) -> KmsError {
    KmsError::not_found(operation, ApiFailure::new("NotFoundException", "key not found"))
}

pub fn access_denied(operation: &str) -> KmsError {
    KmsError::from_code(
        HandlerErrorCode::AccessDenied,
        operation,
        ApiFailure::new("AccessDeniedException", "not authorized"),
    )
}

pub fn invalid_state(operation: &str) -> KmsError {
    KmsError::from_code(
        HandlerErrorCode::InvalidRequest,
        operation,
        ApiFailure::new("KMSInvalidStateException", "key is pending deletion"),
    )
}

#[derive(Default)]
struct Script {
    calls: Vec<&'static str>,
    describe: VecDeque<Result<KeyMetadata, KmsError>>,
    describe_default: Option<KeyMetadata>,
    created: Vec<CreateKeyInput>,
    create: VecDeque<Result<KeyMetadata, KmsError>>,
    replicated: Vec<ReplicateKeyInput>,
    replicate: VecDeque<Result<KeyMetadata, KmsError>>,
    unit: HashMap<&'static str, VecDeque<Result<(), KmsError>>>,
    policy: VecDeque<Result<String, KmsError>>,
    policies_put: Vec<String>,
    rotation: VecDeque<Result<RotationStatus, KmsError>>,
    list_keys: VecDeque<Result<Page<KeyListEntry>, KmsError>>,
    list_limits: Vec<i32>,
    tags: VecDeque<Result<Page<Tag>, KmsError>>,
    tag_markers: Vec<Option<String>>,
    tagged: Vec<Vec<Tag>>,
    untagged: Vec<Vec<String>>,
    descriptions: Vec<String>,
}

/// Scripted in-memory `KmsApi`. Queued responses are returned in order;
/// once a queue is empty every call succeeds with a neutral default.
#[derive(Default)]
pub struct MockKms {
    script: Mutex<Script>,
}

impl MockKms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn push_describe(&self, result: Result<KeyMetadata, KmsError>) {
        self.with(|s| s.describe.push_back(result));
    }

    pub fn set_describe_default(&self, meta: KeyMetadata) {
        self.with(|s| s.describe_default = Some(meta));
    }

    pub fn push_create(&self, result: Result<KeyMetadata, KmsError>) {
        self.with(|s| s.create.push_back(result));
    }

    pub fn push_replicate(&self, result: Result<KeyMetadata, KmsError>) {
        self.with(|s| s.replicate.push_back(result));
    }

    /// Queue a result for one of the operations that return nothing.
    pub fn push_unit(&self, operation: &'static str, result: Result<(), KmsError>) {
        self.with(|s| s.unit.entry(operation).or_default().push_back(result));
    }

    pub fn push_policy(&self, result: Result<String, KmsError>) {
        self.with(|s| s.policy.push_back(result));
    }

    pub fn push_rotation(&self, result: Result<RotationStatus, KmsError>) {
        self.with(|s| s.rotation.push_back(result));
    }

    pub fn push_list_keys(&self, result: Result<Page<KeyListEntry>, KmsError>) {
        self.with(|s| s.list_keys.push_back(result));
    }

    pub fn push_tags(&self, result: Result<Page<Tag>, KmsError>) {
        self.with(|s| s.tags.push_back(result));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, operation: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| **c == operation).count())
    }

    /// Mutating calls, in the order they were issued.
    pub fn mutations(&self) -> Vec<&'static str> {
        self.with(|s| {
            s.calls
                .iter()
                .copied()
                .filter(|c| MUTATIONS.contains(c))
                .collect()
        })
    }

    pub fn created(&self) -> Vec<CreateKeyInput> {
        self.with(|s| s.created.clone())
    }

    pub fn replicated(&self) -> Vec<ReplicateKeyInput> {
        self.with(|s| s.replicated.clone())
    }

    pub fn policies_put(&self) -> Vec<String> {
        self.with(|s| s.policies_put.clone())
    }

    pub fn tag_markers(&self) -> Vec<Option<String>> {
        self.with(|s| s.tag_markers.clone())
    }

    pub fn list_limits(&self) -> Vec<i32> {
        self.with(|s| s.list_limits.clone())
    }

    pub fn tagged(&self) -> Vec<Vec<Tag>> {
        self.with(|s| s.tagged.clone())
    }

    pub fn untagged(&self) -> Vec<Vec<String>> {
        self.with(|s| s.untagged.clone())
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.with(|s| s.descriptions.clone())
    }

    fn unit(&self, operation: &'static str) -> BoxFuture<'_, Result<(), KmsError>> {
        let result = self.with(|s| {
            s.calls.push(operation);
            s.unit
                .get_mut(operation)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(()))
        });
        Box::pin(async move { result })
    }
}

impl KmsApi for MockKms {
    fn describe_key(&self, key_id: String) -> BoxFuture<'_, Result<KeyMetadata, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("DescribeKey");
            s.describe.pop_front().unwrap_or_else(|| {
                Ok(s.describe_default
                    .clone()
                    .unwrap_or_else(|| metadata(&key_id, KeyState::Enabled)))
            })
        });
        Box::pin(async move { result })
    }

    fn create_key(&self, input: CreateKeyInput) -> BoxFuture<'_, Result<KeyMetadata, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("CreateKey");
            s.created.push(input);
            s.create
                .pop_front()
                .unwrap_or_else(|| Ok(metadata(KEY_ID, KeyState::Enabled)))
        });
        Box::pin(async move { result })
    }

    fn replicate_key(
        &self,
        input: ReplicateKeyInput,
    ) -> BoxFuture<'_, Result<KeyMetadata, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("ReplicateKey");
            let primary = input.primary_key_arn.clone();
            s.replicated.push(input);
            s.replicate
                .pop_front()
                .unwrap_or_else(|| Ok(replica_metadata(KEY_ID, KeyState::Creating, &primary)))
        });
        Box::pin(async move { result })
    }

    fn schedule_key_deletion(
        &self,
        _key_id: String,
        _pending_window_in_days: Option<i32>,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        self.unit("ScheduleKeyDeletion")
    }

    fn enable_key(&self, _key_id: String) -> BoxFuture<'_, Result<(), KmsError>> {
        self.unit("EnableKey")
    }

    fn disable_key(&self, _key_id: String) -> BoxFuture<'_, Result<(), KmsError>> {
        self.unit("DisableKey")
    }

    fn enable_key_rotation(
        &self,
        _key_id: String,
        _rotation_period_in_days: Option<i32>,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        self.unit("EnableKeyRotation")
    }

    fn disable_key_rotation(&self, _key_id: String) -> BoxFuture<'_, Result<(), KmsError>> {
        self.unit("DisableKeyRotation")
    }

    fn get_key_rotation_status(
        &self,
        _key_id: String,
    ) -> BoxFuture<'_, Result<RotationStatus, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("GetKeyRotationStatus");
            s.rotation
                .pop_front()
                .unwrap_or(Ok(RotationStatus::default()))
        });
        Box::pin(async move { result })
    }

    fn get_key_policy(&self, _key_id: String) -> BoxFuture<'_, Result<String, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("GetKeyPolicy");
            s.policy
                .pop_front()
                .unwrap_or_else(|| Ok(r#"{"Version":"2012-10-17","Statement":[]}"#.to_string()))
        });
        Box::pin(async move { result })
    }

    fn put_key_policy(
        &self,
        _key_id: String,
        policy: String,
        _bypass_policy_lockout_safety_check: bool,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        self.with(|s| s.policies_put.push(policy));
        self.unit("PutKeyPolicy")
    }

    fn list_keys(
        &self,
        _marker: Option<String>,
        limit: i32,
    ) -> BoxFuture<'_, Result<Page<KeyListEntry>, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("ListKeys");
            s.list_limits.push(limit);
            s.list_keys.pop_front().unwrap_or(Ok(Page::last(Vec::new())))
        });
        Box::pin(async move { result })
    }

    fn list_resource_tags(
        &self,
        _key_id: String,
        marker: Option<String>,
    ) -> BoxFuture<'_, Result<Page<Tag>, KmsError>> {
        let result = self.with(|s| {
            s.calls.push("ListResourceTags");
            s.tag_markers.push(marker);
            s.tags.pop_front().unwrap_or(Ok(Page::last(Vec::new())))
        });
        Box::pin(async move { result })
    }

    fn tag_resource(&self, _key_id: String, tags: Vec<Tag>) -> BoxFuture<'_, Result<(), KmsError>> {
        self.with(|s| s.tagged.push(tags));
        self.unit("TagResource")
    }

    fn untag_resource(
        &self,
        _key_id: String,
        tag_keys: Vec<String>,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        self.with(|s| s.untagged.push(tag_keys));
        self.unit("UntagResource")
    }

    fn update_key_description(
        &self,
        _key_id: String,
        description: String,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        self.with(|s| s.descriptions.push(description));
        self.unit("UpdateKeyDescription")
    }
}

/// Hands out one mock per region; unknown regions get the local mock.
pub struct MockFactory {
    local: Arc<MockKms>,
    regions: HashMap<String, Arc<MockKms>>,
    requested: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new(local: Arc<MockKms>) -> Self {
        Self {
            local,
            regions: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_region(mut self, region: &str, client: Arc<MockKms>) -> Self {
        self.regions.insert(region.to_string(), client);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl ClientFactory for MockFactory {
    fn client(&self, region: &str) -> Arc<dyn KmsApi> {
        self.requested.lock().unwrap().push(region.to_string());
        self.regions
            .get(region)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.local))
    }
}

pub fn orchestrator(kms: &Arc<MockKms>) -> KeyOrchestrator {
    orchestrator_with(kms, &ProviderConfig::default())
}

pub fn orchestrator_with(kms: &Arc<MockKms>, config: &ProviderConfig) -> KeyOrchestrator {
    let factory = MockFactory::new(Arc::clone(kms));
    KeyOrchestrator::new(Arc::new(factory), REGION, config)
}

pub fn request<M>(desired: M) -> ResourceHandlerRequest<M> {
    let mut request = ResourceHandlerRequest::new(desired);
    request.aws_account_id = ACCOUNT_ID.to_string();
    request
}

/// Re-invoke until the operation finishes, feeding back the returned model
/// and context the way the caller would. Returns the terminal event and the
/// delay requested by every suspension.
pub async fn drive<H>(
    handler: &H,
    action: Action,
    mut request: ResourceHandlerRequest<H::Model>,
) -> (ProgressEvent<H::Model>, Vec<u32>)
where
    H: ResourceHandler,
    H::Model: Clone,
{
    let mut context = None;
    let mut delays = Vec::new();
    for _ in 0..50 {
        let event = invoke(handler, action, &request, context).await;
        if event.is_terminal() {
            return (event, delays);
        }
        delays.push(event.callback_delay_seconds);
        context = event.callback_context;
        if let Some(model) = event.resource_model {
            request.desired_resource_state = Some(model);
        }
    }
    panic!("operation did not reach a terminal state");
}
