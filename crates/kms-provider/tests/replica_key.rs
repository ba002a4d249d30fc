mod common;

use std::sync::Arc;

use kms_provider::{Action, KeyOrchestrator, ProviderConfig, ReplicaKeyHandler, invoke};
use kms_provider_client::{KeyListEntry, KeyState, Page};
use kms_provider_core::models::ReplicaKeyModel;
use kms_provider_core::{HandlerErrorCode, OperationStatus};

use common::{
    ACCOUNT_ID, KEY_ID, MockFactory, MockKms, REGION, arn, drive, metadata, orchestrator,
    replica_metadata, request,
};

const PRIMARY_REGION: &str = "us-west-2";

fn primary_arn() -> String {
    arn(PRIMARY_REGION, "mrk-1")
}

fn replica(enabled: bool) -> ReplicaKeyModel {
    ReplicaKeyModel {
        key_id: Some(KEY_ID.into()),
        primary_key_arn: Some(primary_arn()),
        enabled: Some(enabled),
        ..Default::default()
    }
}

/// Local mock for the replica region, plus a separate one for the primary.
fn handler_with_primary(local: &Arc<MockKms>, primary: &Arc<MockKms>) -> ReplicaKeyHandler {
    let factory =
        MockFactory::new(Arc::clone(local)).with_region(PRIMARY_REGION, Arc::clone(primary));
    ReplicaKeyHandler::new(KeyOrchestrator::new(
        Arc::new(factory),
        REGION,
        &ProviderConfig::default(),
    ))
}

#[tokio::test]
async fn create_replicates_through_primary_region_and_waits_for_creation() {
    let local = MockKms::new();
    let primary = MockKms::new();
    local.push_describe(Ok(replica_metadata(KEY_ID, KeyState::Creating, &primary_arn())));
    let handler = handler_with_primary(&local, &primary);
    let req = request(ReplicaKeyModel {
        primary_key_arn: Some(primary_arn()),
        description: Some("replica".into()),
        pending_window_in_days: Some(7),
        ..Default::default()
    });

    let (event, delays) = drive(&handler, Action::Create, req).await;

    assert_eq!(event.status, OperationStatus::Success);
    // One creation poll, then the create propagation wait.
    assert_eq!(delays, vec![5, 15]);
    assert_eq!(primary.calls(), vec!["ReplicateKey"]);
    assert!(local.mutations().is_empty());

    let input = &primary.replicated()[0];
    assert_eq!(input.primary_key_arn, primary_arn());
    assert_eq!(input.replica_region, REGION);
    assert_eq!(input.description.as_deref(), Some("replica"));
    assert!(
        input
            .policy
            .as_deref()
            .unwrap()
            .contains(&format!("arn:aws:iam::{ACCOUNT_ID}:root"))
    );

    let model = event.resource_model.unwrap();
    assert_eq!(model.key_id.as_deref(), Some(KEY_ID));
    assert_eq!(model.primary_key_arn, Some(primary_arn()));
    assert_eq!(model.pending_window_in_days, None);
}

#[tokio::test]
async fn create_rejects_request_region_other_than_provider_region() {
    let local = MockKms::new();
    let primary = MockKms::new();
    let elsewhere = MockKms::new();
    let factory = MockFactory::new(Arc::clone(&local))
        .with_region(PRIMARY_REGION, Arc::clone(&primary))
        .with_region("eu-west-1", Arc::clone(&elsewhere));
    let handler = ReplicaKeyHandler::new(KeyOrchestrator::new(
        Arc::new(factory),
        REGION,
        &ProviderConfig::default(),
    ));
    let mut req = request(ReplicaKeyModel {
        primary_key_arn: Some(primary_arn()),
        enabled: Some(false),
        ..Default::default()
    });
    req.region = Some("eu-west-1".into());

    let event = invoke(&handler, Action::Create, &req, None).await;

    assert_eq!(event.status, OperationStatus::Failed);
    assert_eq!(event.error_code, Some(HandlerErrorCode::InvalidRequest));
    assert!(primary.calls().is_empty());
    assert!(local.calls().is_empty());
    assert!(elsewhere.calls().is_empty());
}

#[tokio::test]
async fn create_keeps_follow_up_calls_in_the_replica_region() {
    let local = MockKms::new();
    let primary = MockKms::new();
    local.push_describe(Ok(replica_metadata(KEY_ID, KeyState::Creating, &primary_arn())));
    let handler = handler_with_primary(&local, &primary);
    let mut req = request(ReplicaKeyModel {
        primary_key_arn: Some(primary_arn()),
        enabled: Some(false),
        ..Default::default()
    });
    req.region = Some(REGION.into());

    let (event, delays) = drive(&handler, Action::Create, req).await;

    assert_eq!(event.status, OperationStatus::Success);
    assert_eq!(delays, vec![5, 15]);
    assert_eq!(primary.replicated()[0].replica_region, REGION);
    assert_eq!(primary.calls(), vec!["ReplicateKey"]);
    assert_eq!(local.mutations(), vec!["DisableKey"]);
    assert!(local.count("DescribeKey") >= 2);
    assert_eq!(local.count("GetKeyPolicy"), 1);
    assert_eq!(local.count("ListResourceTags"), 1);
}

#[tokio::test]
async fn create_requires_primary_key_arn() {
    let kms = MockKms::new();
    let handler = ReplicaKeyHandler::new(orchestrator(&kms));

    let event = invoke(&handler, Action::Create, &request(ReplicaKeyModel::default()), None).await;

    assert_eq!(event.status, OperationStatus::Failed);
    assert_eq!(event.error_code, Some(HandlerErrorCode::InvalidRequest));
    assert!(kms.calls().is_empty());
}

#[tokio::test]
async fn create_rejects_malformed_primary_key_arn() {
    let kms = MockKms::new();
    let handler = ReplicaKeyHandler::new(orchestrator(&kms));
    let req = request(ReplicaKeyModel {
        primary_key_arn: Some("mrk-1".into()),
        ..Default::default()
    });

    let event = invoke(&handler, Action::Create, &req, None).await;

    assert_eq!(event.error_code, Some(HandlerErrorCode::InvalidRequest));
    assert!(kms.calls().is_empty());
}

#[tokio::test]
async fn update_disables_replica_and_waits_for_update_propagation() {
    let kms = MockKms::new();
    let handler = ReplicaKeyHandler::new(orchestrator(&kms));
    let req = request(replica(false)).with_previous(replica(true));

    let (event, delays) = drive(&handler, Action::Update, req).await;

    assert_eq!(event.status, OperationStatus::Success);
    assert_eq!(kms.mutations(), vec!["DisableKey"]);
    assert_eq!(delays, vec![60]);
}

#[tokio::test]
async fn update_enables_replica_and_waits_before_continuing() {
    let kms = MockKms::new();
    let handler = ReplicaKeyHandler::new(orchestrator(&kms));
    let req = request(replica(true)).with_previous(replica(false));

    let (event, delays) = drive(&handler, Action::Update, req).await;

    assert_eq!(event.status, OperationStatus::Success);
    assert_eq!(kms.mutations(), vec!["EnableKey"]);
    assert_eq!(delays, vec![60, 60]);
}

#[tokio::test]
async fn delete_treats_pending_replica_deletion_as_done() {
    let kms = MockKms::new();
    kms.push_describe(Ok(metadata(KEY_ID, KeyState::Enabled)));
    kms.set_describe_default(metadata(KEY_ID, KeyState::PendingReplicaDeletion));
    let handler = ReplicaKeyHandler::new(orchestrator(&kms));

    let (event, delays) = drive(&handler, Action::Delete, request(replica(true))).await;

    assert_eq!(event.status, OperationStatus::Success);
    assert_eq!(delays, vec![15]);
    assert_eq!(kms.count("ScheduleKeyDeletion"), 1);
}

#[tokio::test]
async fn list_returns_replicas_only() {
    let kms = MockKms::new();
    kms.push_list_keys(Ok(Page::with_marker(
        vec![
            KeyListEntry {
                key_id: "k1".into(),
                key_arn: None,
            },
            KeyListEntry {
                key_id: "k2".into(),
                key_arn: None,
            },
        ],
        "more",
    )));
    kms.push_describe(Ok(metadata("k1", KeyState::Enabled)));
    kms.push_describe(Ok(replica_metadata("k2", KeyState::Disabled, &primary_arn())));
    let handler = ReplicaKeyHandler::new(orchestrator(&kms));

    let event = invoke(&handler, Action::List, &request(ReplicaKeyModel::default()), None).await;

    let models = event.resource_models.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].key_id.as_deref(), Some("k2"));
    assert_eq!(models[0].primary_key_arn, Some(primary_arn()));
    assert_eq!(event.next_token.as_deref(), Some("more"));
}
