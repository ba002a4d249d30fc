use aws_sdk_kms::Client;
use aws_sdk_kms::types::{KeySpec, KeyUsageType, OriginType};
use kms_provider_core::{ApiFailure, HandlerErrorCode, KmsError, Tag};

use crate::api::{BoxFuture, KmsApi};
use crate::translate::translate;
use crate::types::{
    CreateKeyInput, KeyListEntry, KeyMetadata, KeyState, MultiRegionKeyType, Page,
    ReplicateKeyInput, RotationStatus,
};

const DEFAULT_POLICY_NAME: &str = "default";

/// `KmsApi` backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkKmsClient {
    client: Client,
}

impl SdkKmsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn key_metadata(
    operation: &str,
    meta: Option<&aws_sdk_kms::types::KeyMetadata>,
) -> Result<KeyMetadata, KmsError> {
    let meta = meta.ok_or_else(|| {
        KmsError::from_code(
            HandlerErrorCode::GeneralServiceException,
            operation,
            ApiFailure::message("response carried no key metadata"),
        )
    })?;

    let region_config = meta.multi_region_configuration();
    let multi_region_key_type = region_config
        .and_then(|c| c.multi_region_key_type())
        .and_then(|t| match t.as_str() {
            "PRIMARY" => Some(MultiRegionKeyType::Primary),
            "REPLICA" => Some(MultiRegionKeyType::Replica),
            _ => None,
        });

    Ok(KeyMetadata {
        key_id: meta.key_id().to_string(),
        arn: meta.arn().map(String::from),
        description: meta.description().map(String::from),
        enabled: meta.enabled(),
        key_state: meta
            .key_state()
            .map(|s| KeyState::parse(s.as_str()))
            .unwrap_or_else(|| KeyState::Unknown(String::new())),
        key_spec: meta.key_spec().map(|s| s.as_str().to_string()),
        key_usage: meta.key_usage().map(|u| u.as_str().to_string()),
        origin: meta.origin().map(|o| o.as_str().to_string()),
        key_manager: meta.key_manager().map(|m| m.as_str().to_string()),
        multi_region: meta.multi_region().unwrap_or(false),
        multi_region_key_type,
        primary_key_arn: region_config
            .and_then(|c| c.primary_key())
            .and_then(|k| k.arn())
            .map(String::from),
    })
}

fn sdk_tags(operation: &str, tags: Vec<Tag>) -> Result<Vec<aws_sdk_kms::types::Tag>, KmsError> {
    tags.into_iter()
        .map(|tag| {
            aws_sdk_kms::types::Tag::builder()
                .tag_key(tag.key)
                .tag_value(tag.value)
                .build()
                .map_err(|e| {
                    KmsError::from_code(
                        HandlerErrorCode::InvalidRequest,
                        operation,
                        ApiFailure::message(e.to_string()),
                    )
                })
        })
        .collect()
}

fn non_empty(tags: Vec<aws_sdk_kms::types::Tag>) -> Option<Vec<aws_sdk_kms::types::Tag>> {
    if tags.is_empty() { None } else { Some(tags) }
}

impl KmsApi for SdkKmsClient {
    fn describe_key(&self, key_id: String) -> BoxFuture<'_, Result<KeyMetadata, KmsError>> {
        Box::pin(async move {
            const OP: &str = "kms:DescribeKey";
            let resp = self
                .client
                .describe_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| translate(OP, e))?;
            key_metadata(OP, resp.key_metadata())
        })
    }

    fn create_key(&self, input: CreateKeyInput) -> BoxFuture<'_, Result<KeyMetadata, KmsError>> {
        Box::pin(async move {
            const OP: &str = "kms:CreateKey";
            let tags = sdk_tags(OP, input.tags)?;
            let resp = self
                .client
                .create_key()
                .set_description(input.description)
                .key_spec(KeySpec::from(input.key_spec.as_str()))
                .key_usage(KeyUsageType::from(input.key_usage.as_str()))
                .origin(OriginType::from(input.origin.as_str()))
                .set_policy(input.policy)
                .bypass_policy_lockout_safety_check(input.bypass_policy_lockout_safety_check)
                .multi_region(input.multi_region)
                .set_tags(non_empty(tags))
                .send()
                .await
                .map_err(|e| translate(OP, e))?;

            let meta = key_metadata(OP, resp.key_metadata())?;
            tracing::info!(key_id = %meta.key_id, "key created");
            Ok(meta)
        })
    }

    fn replicate_key(
        &self,
        input: ReplicateKeyInput,
    ) -> BoxFuture<'_, Result<KeyMetadata, KmsError>> {
        Box::pin(async move {
            const OP: &str = "kms:ReplicateKey";
            let tags = sdk_tags(OP, input.tags)?;
            let resp = self
                .client
                .replicate_key()
                .key_id(input.primary_key_arn)
                .replica_region(input.replica_region)
                .set_description(input.description)
                .set_policy(input.policy)
                .bypass_policy_lockout_safety_check(input.bypass_policy_lockout_safety_check)
                .set_tags(non_empty(tags))
                .send()
                .await
                .map_err(|e| translate(OP, e))?;

            let meta = key_metadata(OP, resp.replica_key_metadata())?;
            tracing::info!(key_id = %meta.key_id, "replica key created");
            Ok(meta)
        })
    }

    fn schedule_key_deletion(
        &self,
        key_id: String,
        pending_window_in_days: Option<i32>,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .schedule_key_deletion()
                .key_id(key_id)
                .set_pending_window_in_days(pending_window_in_days)
                .send()
                .await
                .map_err(|e| translate("kms:ScheduleKeyDeletion", e))?;
            Ok(())
        })
    }

    fn enable_key(&self, key_id: String) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .enable_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| translate("kms:EnableKey", e))?;
            Ok(())
        })
    }

    fn disable_key(&self, key_id: String) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .disable_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| translate("kms:DisableKey", e))?;
            Ok(())
        })
    }

    fn enable_key_rotation(
        &self,
        key_id: String,
        rotation_period_in_days: Option<i32>,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .enable_key_rotation()
                .key_id(key_id)
                .set_rotation_period_in_days(rotation_period_in_days)
                .send()
                .await
                .map_err(|e| translate("kms:EnableKeyRotation", e))?;
            Ok(())
        })
    }

    fn disable_key_rotation(&self, key_id: String) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .disable_key_rotation()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| translate("kms:DisableKeyRotation", e))?;
            Ok(())
        })
    }

    fn get_key_rotation_status(
        &self,
        key_id: String,
    ) -> BoxFuture<'_, Result<RotationStatus, KmsError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_key_rotation_status()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| translate("kms:GetKeyRotationStatus", e))?;
            Ok(RotationStatus {
                enabled: resp.key_rotation_enabled(),
                rotation_period_in_days: resp.rotation_period_in_days(),
            })
        })
    }

    fn get_key_policy(&self, key_id: String) -> BoxFuture<'_, Result<String, KmsError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_key_policy()
                .key_id(key_id)
                .policy_name(DEFAULT_POLICY_NAME)
                .send()
                .await
                .map_err(|e| translate("kms:GetKeyPolicy", e))?;
            Ok(resp.policy().unwrap_or_default().to_string())
        })
    }

    fn put_key_policy(
        &self,
        key_id: String,
        policy: String,
        bypass_policy_lockout_safety_check: bool,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .put_key_policy()
                .key_id(key_id)
                .policy_name(DEFAULT_POLICY_NAME)
                .policy(policy)
                .bypass_policy_lockout_safety_check(bypass_policy_lockout_safety_check)
                .send()
                .await
                .map_err(|e| translate("kms:PutKeyPolicy", e))?;
            Ok(())
        })
    }

    fn list_keys(
        &self,
        marker: Option<String>,
        limit: i32,
    ) -> BoxFuture<'_, Result<Page<KeyListEntry>, KmsError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_keys()
                .set_marker(marker)
                .limit(limit)
                .send()
                .await
                .map_err(|e| translate("kms:ListKeys", e))?;

            let items = resp
                .keys()
                .iter()
                .filter_map(|entry| {
                    entry.key_id().map(|id| KeyListEntry {
                        key_id: id.to_string(),
                        key_arn: entry.key_arn().map(String::from),
                    })
                })
                .collect();
            Ok(Page {
                items,
                next_marker: resp.next_marker().map(String::from),
            })
        })
    }

    fn list_resource_tags(
        &self,
        key_id: String,
        marker: Option<String>,
    ) -> BoxFuture<'_, Result<Page<Tag>, KmsError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_resource_tags()
                .key_id(key_id)
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| translate("kms:ListResourceTags", e))?;

            let items = resp
                .tags()
                .iter()
                .map(|t| Tag::new(t.tag_key(), t.tag_value()))
                .collect();
            Ok(Page {
                items,
                next_marker: resp.next_marker().map(String::from),
            })
        })
    }

    fn tag_resource(&self, key_id: String, tags: Vec<Tag>) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            const OP: &str = "kms:TagResource";
            let tags = sdk_tags(OP, tags)?;
            self.client
                .tag_resource()
                .key_id(key_id)
                .set_tags(Some(tags))
                .send()
                .await
                .map_err(|e| translate(OP, e))?;
            Ok(())
        })
    }

    fn untag_resource(
        &self,
        key_id: String,
        tag_keys: Vec<String>,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .untag_resource()
                .key_id(key_id)
                .set_tag_keys(Some(tag_keys))
                .send()
                .await
                .map_err(|e| translate("kms:UntagResource", e))?;
            Ok(())
        })
    }

    fn update_key_description(
        &self,
        key_id: String,
        description: String,
    ) -> BoxFuture<'_, Result<(), KmsError>> {
        Box::pin(async move {
            self.client
                .update_key_description()
                .key_id(key_id)
                .description(description)
                .send()
                .await
                .map_err(|e| translate("kms:UpdateKeyDescription", e))?;
            Ok(())
        })
    }
}
