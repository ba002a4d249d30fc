use std::future::Future;
use std::pin::Pin;

use kms_provider_core::{KmsError, Tag};

use crate::types::{
    CreateKeyInput, KeyListEntry, KeyMetadata, Page, ReplicateKeyInput, RotationStatus,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One method per remote operation the orchestrator issues.
///
/// Implementations translate every remote failure into `KmsError`.
/// Methods return boxed futures for dyn compatibility.
pub trait KmsApi: Send + Sync {
    fn describe_key(&self, key_id: String) -> BoxFuture<'_, Result<KeyMetadata, KmsError>>;

    fn create_key(&self, input: CreateKeyInput) -> BoxFuture<'_, Result<KeyMetadata, KmsError>>;

    /// Must be issued against a client for the primary key's region.
    fn replicate_key(
        &self,
        input: ReplicateKeyInput,
    ) -> BoxFuture<'_, Result<KeyMetadata, KmsError>>;

    fn schedule_key_deletion(
        &self,
        key_id: String,
        pending_window_in_days: Option<i32>,
    ) -> BoxFuture<'_, Result<(), KmsError>>;

    fn enable_key(&self, key_id: String) -> BoxFuture<'_, Result<(), KmsError>>;

    fn disable_key(&self, key_id: String) -> BoxFuture<'_, Result<(), KmsError>>;

    fn enable_key_rotation(
        &self,
        key_id: String,
        rotation_period_in_days: Option<i32>,
    ) -> BoxFuture<'_, Result<(), KmsError>>;

    fn disable_key_rotation(&self, key_id: String) -> BoxFuture<'_, Result<(), KmsError>>;

    fn get_key_rotation_status(
        &self,
        key_id: String,
    ) -> BoxFuture<'_, Result<RotationStatus, KmsError>>;

    fn get_key_policy(&self, key_id: String) -> BoxFuture<'_, Result<String, KmsError>>;

    fn put_key_policy(
        &self,
        key_id: String,
        policy: String,
        bypass_policy_lockout_safety_check: bool,
    ) -> BoxFuture<'_, Result<(), KmsError>>;

    fn list_keys(
        &self,
        marker: Option<String>,
        limit: i32,
    ) -> BoxFuture<'_, Result<Page<KeyListEntry>, KmsError>>;

    fn list_resource_tags(
        &self,
        key_id: String,
        marker: Option<String>,
    ) -> BoxFuture<'_, Result<Page<Tag>, KmsError>>;

    fn tag_resource(&self, key_id: String, tags: Vec<Tag>) -> BoxFuture<'_, Result<(), KmsError>>;

    fn untag_resource(
        &self,
        key_id: String,
        tag_keys: Vec<String>,
    ) -> BoxFuture<'_, Result<(), KmsError>>;

    fn update_key_description(
        &self,
        key_id: String,
        description: String,
    ) -> BoxFuture<'_, Result<(), KmsError>>;
}
