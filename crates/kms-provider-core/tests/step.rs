use std::time::Duration;

use kms_provider_core::{
    ApiFailure, BackoffPolicy, CallbackContext, Flow, HandlerErrorCode, KmsError, Step, StepEngine,
};

#[derive(Debug, Default)]
struct Model {
    description: Option<String>,
}

fn not_found() -> KmsError {
    KmsError::not_found("kms:DisableKey", ApiFailure::new("NotFoundException", "no such key"))
}

fn engine() -> StepEngine {
    StepEngine::new(BackoffPolicy::default(), Duration::from_secs(5), 2)
}

#[tokio::test]
async fn successful_step_applies_response() {
    let engine = engine();
    let mut model = Model::default();
    let mut context = CallbackContext::new();

    let flow = engine
        .run(
            Step::new("describe"),
            &mut model,
            &mut context,
            |_| "key-1".to_string(),
            |id| async move { Ok::<_, KmsError>(format!("described {id}")) },
            |resp, model, _| model.description = Some(resp),
        )
        .await
        .unwrap();

    assert_eq!(flow, Flow::Continue);
    assert_eq!(model.description.as_deref(), Some("described key-1"));
}

#[tokio::test]
async fn unfiltered_error_propagates_without_retry() {
    let engine = engine();
    let mut model = Model::default();
    let mut context = CallbackContext::new();

    let err = engine
        .run(
            Step::new("disable"),
            &mut model,
            &mut context,
            |_| (),
            |_| async { Err::<(), _>(not_found()) },
            |_, _, _| {},
        )
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(context.retry_attempts, 0);
}

#[tokio::test]
async fn filtered_error_suspends_with_backoff_until_budget_is_spent() {
    let engine = engine();
    let step = Step::new("disable").retry_on(KmsError::is_not_found);
    let mut model = Model::default();
    let mut context = CallbackContext::new();

    let mut delays = Vec::new();
    loop {
        let result = engine
            .run(
                step,
                &mut model,
                &mut context,
                |_| (),
                |_| async { Err::<(), _>(not_found()) },
                |_, _, _| {},
            )
            .await;
        match result {
            Ok(Flow::Suspend(delay)) => delays.push(delay),
            Ok(Flow::Continue) => panic!("call never succeeds"),
            Err(err) => {
                assert_eq!(err.code(), HandlerErrorCode::NotFound);
                break;
            }
        }
    }

    assert_eq!(delays.len(), 15);
    assert_eq!(delays[0], Duration::from_secs(1));
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(5)));
    assert!(delays.iter().sum::<Duration>() <= Duration::from_secs(60));
}

#[tokio::test]
async fn success_after_retries_resets_the_attempt_counter() {
    let engine = engine();
    let step = Step::new("disable").retry_on(KmsError::is_not_found);
    let mut model = Model::default();
    let mut context = CallbackContext::new();
    context.retry_attempts = 4;

    let flow = engine
        .run(
            step,
            &mut model,
            &mut context,
            |_| (),
            |_| async { Ok::<_, KmsError>(()) },
            |_, _, _| {},
        )
        .await
        .unwrap();

    assert_eq!(flow, Flow::Continue);
    assert_eq!(context.retry_attempts, 0);
}

#[tokio::test]
async fn stabilize_polls_until_stable() {
    let engine = engine();
    let mut context = CallbackContext::new();

    let first = engine
        .stabilize("delete", &mut context, async { Ok(false) })
        .await
        .unwrap();
    assert_eq!(first, Flow::Suspend(Duration::from_secs(5)));
    assert_eq!(context.stabilization_retries_remaining, Some(1));

    let second = engine
        .stabilize("delete", &mut context, async { Ok(true) })
        .await
        .unwrap();
    assert_eq!(second, Flow::Continue);
    assert_eq!(context.stabilization_retries_remaining, None);
}

#[tokio::test]
async fn stabilize_fails_when_polls_run_out() {
    let engine = engine();
    let mut context = CallbackContext::new();
    let mut polls = 0;

    let err = loop {
        polls += 1;
        match engine
            .stabilize("delete", &mut context, async { Ok(false) })
            .await
        {
            Ok(flow) => assert!(flow.is_suspend()),
            Err(err) => break err,
        }
    };

    assert_eq!(err.code(), HandlerErrorCode::NotStabilized);
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn plain_step_leaves_a_pending_retry_counter_alone() {
    let engine = engine();
    let mut model = Model::default();
    let mut context = CallbackContext::new();
    context.retry_attempts = 3;

    engine
        .run(
            Step::new("describe"),
            &mut model,
            &mut context,
            |_| (),
            |_| async { Ok::<_, KmsError>(()) },
            |_, _, _| {},
        )
        .await
        .unwrap();

    assert_eq!(context.retry_attempts, 3);
}
