//! The reconciliation step engine.
//!
//! A step builds a request from the model, invokes one remote operation and
//! folds the response back into the model and context. Instead of blocking,
//! a step that must wait returns [`Flow::Suspend`]; the caller hands the
//! delay back to whoever re-invokes the operation.

use std::future::Future;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::context::CallbackContext;
use crate::error::{ApiFailure, KmsError};

/// What the caller should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Proceed to the next step within this invocation.
    Continue,
    /// Return IN_PROGRESS and resume after the delay.
    Suspend(Duration),
}

impl Flow {
    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend(_))
    }
}

/// Decides whether a failed call is retried with backoff.
pub type RetryFilter = fn(&KmsError) -> bool;

/// A named step, optionally retried on a subset of errors.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub name: &'static str,
    retry_filter: Option<RetryFilter>,
}

impl Step {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            retry_filter: None,
        }
    }

    /// Retry (after a backoff delay) when `filter` matches the error;
    /// anything else propagates immediately.
    pub const fn retry_on(mut self, filter: RetryFilter) -> Self {
        self.retry_filter = Some(filter);
        self
    }

    fn should_retry(&self, err: &KmsError) -> bool {
        self.retry_filter.is_some_and(|filter| filter(err))
    }
}

pub struct StepEngine {
    backoff: BackoffPolicy,
    poll_interval: Duration,
    max_polls: u32,
}

impl Default for StepEngine {
    fn default() -> Self {
        Self::new(BackoffPolicy::default(), Duration::from_secs(5), 120)
    }
}

impl StepEngine {
    pub fn new(backoff: BackoffPolicy, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            backoff,
            poll_interval,
            max_polls,
        }
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Run `build → invoke → apply`.
    ///
    /// On a filtered error the step suspends with the next backoff delay and
    /// bumps `context.retry_attempts`; when the budget is spent the last
    /// error surfaces. A retrying step that succeeds resets the counter.
    pub async fn run<M, Req, Resp, Fut>(
        &self,
        step: Step,
        model: &mut M,
        context: &mut CallbackContext,
        build: impl FnOnce(&M) -> Req,
        invoke: impl FnOnce(Req) -> Fut,
        apply: impl FnOnce(Resp, &mut M, &mut CallbackContext),
    ) -> Result<Flow, KmsError>
    where
        Fut: Future<Output = Result<Resp, KmsError>>,
    {
        let request = build(&*model);
        match invoke(request).await {
            Ok(response) => {
                // Other steps replay in front of a retrying one and must not
                // reset its attempt number.
                if step.retry_filter.is_some() {
                    context.retry_attempts = 0;
                }
                apply(response, model, context);
                Ok(Flow::Continue)
            }
            Err(err) if step.should_retry(&err) => {
                let attempt = context.retry_attempts;
                match self.backoff.next_delay(attempt) {
                    Some(delay) => {
                        context.retry_attempts = attempt + 1;
                        tracing::warn!(
                            step = step.name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying step after backoff"
                        );
                        Ok(Flow::Suspend(delay))
                    }
                    None => {
                        tracing::warn!(
                            step = step.name,
                            attempt,
                            error = %err,
                            "retry budget exhausted"
                        );
                        Err(err)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Poll a describe-style check until `check` reports stable.
    ///
    /// Each unsuccessful poll spends one of the bounded retries and suspends
    /// for the poll interval; running out fails with `NotStabilized`.
    pub async fn stabilize<Fut>(
        &self,
        name: &'static str,
        context: &mut CallbackContext,
        check: Fut,
    ) -> Result<Flow, KmsError>
    where
        Fut: Future<Output = Result<bool, KmsError>>,
    {
        if check.await? {
            tracing::debug!(step = name, "stabilized");
            context.stabilization_retries_remaining = None;
            return Ok(Flow::Continue);
        }

        let remaining = context
            .stabilization_retries_remaining
            .unwrap_or(self.max_polls);
        if remaining == 0 {
            return Err(KmsError::NotStabilized {
                operation: name.to_string(),
                cause: ApiFailure::message(format!(
                    "still not stable after {} polls",
                    self.max_polls
                )),
            });
        }

        context.stabilization_retries_remaining = Some(remaining - 1);
        tracing::info!(
            step = name,
            remaining = remaining - 1,
            delay_seconds = self.poll_interval.as_secs(),
            "not yet stable, polling again"
        );
        Ok(Flow::Suspend(self.poll_interval))
    }
}
