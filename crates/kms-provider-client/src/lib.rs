//! kms-provider-client
//!
//! Thin per-operation wrapper around the AWS KMS SDK. Every call is passed
//! through the error translator so callers only ever see `KmsError`.

pub mod api;
pub mod factory;
pub mod sdk;
pub mod translate;
pub mod types;

pub use crate::api::{BoxFuture, KmsApi};
pub use crate::factory::{ClientFactory, CredentialSource, SdkClientFactory};
pub use crate::sdk::SdkKmsClient;
pub use crate::types::{
    CreateKeyInput, KeyListEntry, KeyMetadata, KeyState, MultiRegionKeyType, Page,
    ReplicateKeyInput, RotationStatus,
};
