//! # Generation Stoppers
//!
//! Stoppers decide, after every generated token, whether generation should
//! end early. The runtime worker evaluates them in order inside the model
//! runtime's step callback; the first stopper that returns a
//! [`FinishReason`] turns the step decision into
//! [`StepDecision::Stop`](crate::runtime::StepDecision::Stop).
//!
//! - [`CancellationStopper`] ends generation once its token is cancelled.
//! - [`MaxTokensStopper`] ends generation at a fixed token count.

use crate::runtime::Step;
use crate::types::FinishReason;

pub mod cancellation;
pub mod max_tokens;

pub use cancellation::CancellationStopper;
pub use max_tokens::MaxTokensStopper;

/// Trait for determining when to stop text generation.
///
/// Each generation owns its own stoppers, so implementations may keep
/// mutable state. They must never panic; unexpected input is logged and
/// treated as "continue".
pub trait Stopper: Send {
    /// Evaluate the step that was just produced.
    ///
    /// Returns `Some(reason)` to stop with that reason, `None` to continue.
    fn should_stop(&mut self, step: &Step<'_>) -> Option<FinishReason>;
}

/// Run `stoppers` in order and return the first finish reason.
pub fn first_stop(stoppers: &mut [Box<dyn Stopper>], step: &Step<'_>) -> Option<FinishReason> {
    stoppers
        .iter_mut()
        .find_map(|stopper| stopper.should_stop(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_first_stopper_wins() {
        let token = CancellationToken::new();
        let mut stoppers: Vec<Box<dyn Stopper>> = vec![
            Box::new(CancellationStopper::new(token.clone())),
            Box::new(MaxTokensStopper::new(2)),
        ];

        let step = Step {
            token_count: 1,
            text: "a",
        };
        assert_eq!(first_stop(&mut stoppers, &step), None);

        token.cancel();
        let step = Step {
            token_count: 2,
            text: "ab",
        };
        assert_eq!(first_stop(&mut stoppers, &step), Some(FinishReason::Cancelled));
    }

    #[test]
    fn test_empty_stopper_list_never_stops() {
        let step = Step {
            token_count: 10_000,
            text: "",
        };
        assert_eq!(first_stop(&mut [], &step), None);
    }
}
