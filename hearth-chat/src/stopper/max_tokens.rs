use super::Stopper;
use crate::runtime::Step;
use crate::types::FinishReason;
use tracing::{debug, warn};

/// Stopper that limits generation to a maximum number of tokens.
///
/// The model runtime reports cumulative token counts, so the stopper only
/// compares the latest count against the limit.
#[derive(Debug)]
pub struct MaxTokensStopper {
    max_tokens: usize,
    tokens_generated: usize,
}

impl MaxTokensStopper {
    pub fn new(max_tokens: usize) -> Self {
        debug!(
            "Creating MaxTokensStopper with limit: {} tokens",
            max_tokens
        );

        if max_tokens == 0 {
            warn!("MaxTokensStopper created with 0 token limit - will stop immediately");
        }

        Self {
            max_tokens,
            tokens_generated: 0,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn tokens_generated(&self) -> usize {
        self.tokens_generated
    }

    pub fn tokens_remaining(&self) -> usize {
        self.max_tokens.saturating_sub(self.tokens_generated)
    }

    pub fn is_limit_reached(&self) -> bool {
        self.tokens_generated >= self.max_tokens
    }
}

impl Stopper for MaxTokensStopper {
    fn should_stop(&mut self, step: &Step<'_>) -> Option<FinishReason> {
        if step.token_count < self.tokens_generated {
            warn!(
                "MaxTokensStopper saw token count go backwards ({} -> {}), ignoring",
                self.tokens_generated, step.token_count
            );
            return None;
        }
        self.tokens_generated = step.token_count;

        if self.is_limit_reached() {
            debug!(
                "MaxTokensStopper: limit reached at {} tokens",
                self.tokens_generated
            );
            Some(FinishReason::MaxTokens)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(token_count: usize) -> Step<'static> {
        Step {
            token_count,
            text: "",
        }
    }

    #[test]
    fn test_stops_at_limit() {
        let mut stopper = MaxTokensStopper::new(3);
        assert_eq!(stopper.should_stop(&step(1)), None);
        assert_eq!(stopper.should_stop(&step(2)), None);
        assert_eq!(stopper.tokens_remaining(), 1);
        assert_eq!(stopper.should_stop(&step(3)), Some(FinishReason::MaxTokens));
        assert!(stopper.is_limit_reached());
    }

    #[test]
    fn test_zero_limit_stops_on_first_step() {
        let mut stopper = MaxTokensStopper::new(0);
        assert_eq!(stopper.should_stop(&step(1)), Some(FinishReason::MaxTokens));
    }

    #[test]
    fn test_backwards_count_is_ignored() {
        let mut stopper = MaxTokensStopper::new(5);
        stopper.should_stop(&step(4));
        assert_eq!(stopper.should_stop(&step(2)), None);
        assert_eq!(stopper.tokens_generated(), 4);
        assert_eq!(stopper.max_tokens(), 5);
    }
}
