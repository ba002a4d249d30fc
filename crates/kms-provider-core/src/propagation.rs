use std::time::Duration;

use crate::context::CallbackContext;
use crate::step::Flow;

/// Decides how long to wait after mutations before the remote read paths are
/// considered consistent. Exactly one real delay is inserted per logical
/// operation, however many times the operation is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPolicy {
    pub update_delay: Duration,
    pub create_delete_delay: Duration,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            update_delay: Duration::from_secs(60),
            create_delete_delay: Duration::from_secs(15),
        }
    }
}

impl PropagationPolicy {
    pub fn set_request_type(context: &mut CallbackContext, is_update: bool) {
        context.is_update = is_update;
    }

    pub fn delay_for(&self, context: &CallbackContext) -> Duration {
        if context.is_update {
            self.update_delay
        } else {
            self.create_delete_delay
        }
    }

    pub fn wait_for_changes_to_propagate(&self, context: &mut CallbackContext) -> Flow {
        if context.propagation_complete {
            return Flow::Continue;
        }

        context.propagation_complete = true;
        let delay = self.delay_for(context);
        tracing::info!(
            delay_seconds = delay.as_secs(),
            is_update = context.is_update,
            "waiting for changes to propagate"
        );
        Flow::Suspend(delay)
    }
}
