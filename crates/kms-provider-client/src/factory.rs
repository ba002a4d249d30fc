use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::KmsApi;
use crate::sdk::SdkKmsClient;

/// Where the SDK gets its credentials from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    Inline {
        access_key_id: String,
        secret_access_key: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        session_token: Option<String>,
    },
    Profile {
        profile_name: String,
    },
    #[default]
    DefaultChain,
}

/// Hands out region-scoped clients. Injected into the orchestrator so
/// handlers never build clients themselves.
pub trait ClientFactory: Send + Sync {
    fn client(&self, region: &str) -> Arc<dyn KmsApi>;
}

/// Builds `SdkKmsClient`s from one shared SDK config.
pub struct SdkClientFactory {
    config: aws_config::SdkConfig,
}

impl SdkClientFactory {
    pub fn new(config: aws_config::SdkConfig) -> Self {
        Self { config }
    }

    /// Build a factory from the default AWS config.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(config)
    }

    pub async fn with_credentials(region: &str, creds: &CredentialSource) -> Self {
        Self::new(build_aws_config(region, creds).await)
    }
}

impl ClientFactory for SdkClientFactory {
    fn client(&self, region: &str) -> Arc<dyn KmsApi> {
        let conf = aws_sdk_kms::config::Builder::from(&self.config)
            .region(aws_sdk_kms::config::Region::new(region.to_string()))
            .build();
        tracing::debug!(region, "built KMS client");
        Arc::new(SdkKmsClient::new(aws_sdk_kms::Client::from_conf(conf)))
    }
}

/// Build an `SdkConfig` from a region and credential source.
pub async fn build_aws_config(region: &str, creds: &CredentialSource) -> aws_config::SdkConfig {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));

    match creds {
        CredentialSource::Inline {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            builder = builder.credentials_provider(aws_sdk_kms::config::Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                "kms-provider-config",
            ));
        }
        CredentialSource::Profile { profile_name } => {
            builder = builder.profile_name(profile_name);
        }
        CredentialSource::DefaultChain => {}
    }

    builder.load().await
}
