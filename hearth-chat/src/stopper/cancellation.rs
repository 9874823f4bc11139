use super::Stopper;
use crate::runtime::Step;
use crate::types::FinishReason;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stops generation at the first step after its token is cancelled.
#[derive(Debug, Clone)]
pub struct CancellationStopper {
    token: CancellationToken,
}

impl CancellationStopper {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Stopper for CancellationStopper {
    fn should_stop(&mut self, step: &Step<'_>) -> Option<FinishReason> {
        if self.token.is_cancelled() {
            debug!("Cancellation observed at token {}", step.token_count);
            Some(FinishReason::Cancelled)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_only_after_cancel() {
        let token = CancellationToken::new();
        let mut stopper = CancellationStopper::new(token.child_token());
        let step = Step {
            token_count: 1,
            text: "x",
        };

        assert_eq!(stopper.should_stop(&step), None);
        token.cancel();
        assert_eq!(stopper.should_stop(&step), Some(FinishReason::Cancelled));
    }
}
