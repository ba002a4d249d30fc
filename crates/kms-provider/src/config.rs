use std::path::Path;
use std::time::Duration;

use kms_provider_client::CredentialSource;
use kms_provider_core::{BackoffPolicy, PropagationPolicy, StepEngine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config_version {found} is newer than this build supports ({CURRENT_VERSION})")]
    UnsupportedVersion { found: u64 },

    #[error("invalid backoff settings: {0}")]
    InvalidBackoff(String),

    #[error("config is not a JSON object")]
    NotAnObject,
}

/// Tunables for one provider process. Every field has a default, so an
/// empty file (or no file) gives the documented behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    pub config_version: u32,
    /// Region used when the request does not carry one.
    pub region: Option<String>,
    pub credentials: CredentialSource,

    pub update_propagation_delay_secs: u64,
    pub create_delete_propagation_delay_secs: u64,

    pub backoff_min_delay_ms: u64,
    pub backoff_max_delay_ms: u64,
    pub backoff_factor: f64,
    pub backoff_budget_secs: u64,

    pub stabilization_poll_interval_secs: u64,
    pub stabilization_max_polls: u32,

    pub list_page_size: i32,
    /// Swallow AccessDenied on the policy, rotation and tag reads of a read
    /// operation and return what could be read.
    pub soft_fail_read_access_denied: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            region: None,
            credentials: CredentialSource::DefaultChain,
            update_propagation_delay_secs: 60,
            create_delete_propagation_delay_secs: 15,
            backoff_min_delay_ms: 1_000,
            backoff_max_delay_ms: 5_000,
            backoff_factor: 1.3,
            backoff_budget_secs: 60,
            stabilization_poll_interval_secs: 5,
            stabilization_max_polls: 120,
            list_page_size: 50,
            soft_fail_read_access_denied: true,
        }
    }
}

impl ProviderConfig {
    /// Read, migrate and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        // Parse as raw JSON so migrations run before deserializing.
        let json: serde_json::Value = serde_json::from_str(contents)?;
        let on_disk_version = json
            .get("config_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let migrated = migrate(json, on_disk_version)?;
        let config: Self = serde_json::from_value(migrated)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject backoff values that would make delays negative or shrink them.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(ConfigError::InvalidBackoff(format!(
                "backoff_factor must be at least 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.backoff_min_delay_ms > self.backoff_max_delay_ms {
            return Err(ConfigError::InvalidBackoff(format!(
                "backoff_min_delay_ms ({}) exceeds backoff_max_delay_ms ({})",
                self.backoff_min_delay_ms, self.backoff_max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            min_delay: Duration::from_millis(self.backoff_min_delay_ms),
            max_delay: Duration::from_millis(self.backoff_max_delay_ms),
            factor: self.backoff_factor,
            budget: Duration::from_secs(self.backoff_budget_secs),
        }
    }

    pub fn propagation(&self) -> PropagationPolicy {
        PropagationPolicy {
            update_delay: Duration::from_secs(self.update_propagation_delay_secs),
            create_delete_delay: Duration::from_secs(self.create_delete_propagation_delay_secs),
        }
    }

    pub fn step_engine(&self) -> StepEngine {
        StepEngine::new(
            self.backoff(),
            Duration::from_secs(self.stabilization_poll_interval_secs),
            self.stabilization_max_polls,
        )
    }
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(
    mut json: serde_json::Value,
    from_version: u64,
) -> Result<serde_json::Value, ConfigError> {
    if from_version > u64::from(CURRENT_VERSION) {
        return Err(ConfigError::UnsupportedVersion {
            found: from_version,
        });
    }

    // v0 → v1: pre-versioned files only need the stamp.
    if from_version < 1 {
        let obj = json.as_object_mut().ok_or(ConfigError::NotAnObject)?;
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1");
    }

    Ok(json)
}
