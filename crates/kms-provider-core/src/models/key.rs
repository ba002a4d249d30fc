use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tag::Tag;

pub const DEFAULT_KEY_SPEC: &str = "SYMMETRIC_DEFAULT";
pub const DEFAULT_KEY_USAGE: &str = "ENCRYPT_DECRYPT";
pub const DEFAULT_ORIGIN: &str = "AWS_KMS";

/// Declared/observed state of a customer managed key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_key_rotation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period_in_days: Option<i32>,
    /// Either a JSON object or a JSON document encoded as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_policy: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_usage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_region: Option<bool>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_window_in_days: Option<i32>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_policy_lockout_safety_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl KeyModel {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn is_rotation_enabled(&self) -> bool {
        self.enable_key_rotation.unwrap_or(false)
    }

    pub fn key_spec(&self) -> &str {
        self.key_spec.as_deref().unwrap_or(DEFAULT_KEY_SPEC)
    }

    pub fn key_usage(&self) -> &str {
        self.key_usage.as_deref().unwrap_or(DEFAULT_KEY_USAGE)
    }

    /// Automatic rotation is only offered for symmetric encryption keys.
    pub fn supports_rotation(&self) -> bool {
        self.key_spec() == DEFAULT_KEY_SPEC && self.key_usage() == DEFAULT_KEY_USAGE
    }
}
