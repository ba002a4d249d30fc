//! Capability traits implemented by each key variant.
//!
//! The orchestrator is generic over these instead of over a concrete model,
//! so one implementation of each sub-operation serves every variant.

use kms_provider_client::KeyMetadata;
use kms_provider_core::Tag;
use serde_json::Value;

/// A resource addressed by a key identifier and described by key metadata.
pub trait IdentifiableResource {
    fn key_id(&self) -> Option<&str>;

    fn description(&self) -> Option<&str>;

    fn is_enabled(&self) -> bool;

    /// Record the identity of a freshly created key without touching any
    /// declared property.
    fn set_identity(&mut self, meta: &KeyMetadata);

    /// Copy observed metadata into the model.
    fn apply_metadata(&mut self, meta: &KeyMetadata);
}

pub trait PolicyBearingResource {
    fn key_policy(&self) -> Option<&Value>;

    fn set_key_policy(&mut self, policy: Value);

    fn bypass_policy_lockout_safety_check(&self) -> bool {
        false
    }
}

pub trait TaggableResource {
    fn tags(&self) -> Option<&[Tag]>;

    fn set_tags(&mut self, tags: Vec<Tag>);
}

/// Properties that only matter while creating or deleting the resource.
pub trait CreatableResource {
    fn pending_window_in_days(&self) -> Option<i32>;

    /// Clear write-only properties before the model is handed back.
    fn redact_write_only(&mut self);
}
