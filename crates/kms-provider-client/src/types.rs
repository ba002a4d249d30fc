use kms_provider_core::Tag;

/// Remote lifecycle state of a key, as reported by describe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyState {
    Creating,
    #[default]
    Enabled,
    Disabled,
    PendingDeletion,
    PendingReplicaDeletion,
    PendingImport,
    Unavailable,
    Updating,
    Unknown(String),
}

impl KeyState {
    pub fn parse(state: &str) -> Self {
        match state {
            "Creating" => Self::Creating,
            "Enabled" => Self::Enabled,
            "Disabled" => Self::Disabled,
            "PendingDeletion" => Self::PendingDeletion,
            "PendingReplicaDeletion" => Self::PendingReplicaDeletion,
            "PendingImport" => Self::PendingImport,
            "Unavailable" => Self::Unavailable,
            "Updating" => Self::Updating,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Both deletion-pending states count as "gone" for read/update and as
    /// the success condition for delete.
    pub fn is_pending_deletion(&self) -> bool {
        matches!(self, Self::PendingDeletion | Self::PendingReplicaDeletion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiRegionKeyType {
    Primary,
    Replica,
}

/// The subset of key metadata the provider reads back into its models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMetadata {
    pub key_id: String,
    pub arn: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub key_state: KeyState,
    pub key_spec: Option<String>,
    pub key_usage: Option<String>,
    pub origin: Option<String>,
    pub key_manager: Option<String>,
    pub multi_region: bool,
    pub multi_region_key_type: Option<MultiRegionKeyType>,
    pub primary_key_arn: Option<String>,
}

impl KeyMetadata {
    pub fn new(key_id: impl Into<String>, key_state: KeyState) -> Self {
        let enabled = key_state == KeyState::Enabled;
        Self {
            key_id: key_id.into(),
            enabled,
            key_state,
            ..Default::default()
        }
    }

    pub fn is_replica(&self) -> bool {
        self.multi_region_key_type == Some(MultiRegionKeyType::Replica)
    }

    /// Keys created by AWS services on a customer's behalf are never managed
    /// here.
    pub fn is_customer_managed(&self) -> bool {
        self.key_manager.as_deref().is_none_or(|m| m == "CUSTOMER")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyListEntry {
    pub key_id: String,
    pub key_arn: Option<String>,
}

/// One page of a cursor-paginated listing. `next_marker` is `None` on the
/// last page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }

    pub fn with_marker(items: Vec<T>, marker: impl Into<String>) -> Self {
        Self {
            items,
            next_marker: Some(marker.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateKeyInput {
    pub description: Option<String>,
    pub key_spec: String,
    pub key_usage: String,
    pub origin: String,
    pub policy: Option<String>,
    pub bypass_policy_lockout_safety_check: bool,
    pub multi_region: bool,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicateKeyInput {
    pub primary_key_arn: String,
    pub replica_region: String,
    pub description: Option<String>,
    pub policy: Option<String>,
    pub bypass_policy_lockout_safety_check: bool,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationStatus {
    pub enabled: bool,
    pub rotation_period_in_days: Option<i32>,
}
