// Per-file wall-clock budget.
//
// Embedding and clustering cost grows with the sample, so each file gets a
// deadline that stages check between steps and inside long loops.

use std::time::{Duration, Instant};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail with `Timeout` if the budget has run out.
    pub fn check(&self, stage: &'static str) -> PipelineResult<()> {
        match self.budget {
            Some(budget) if self.started.elapsed() > budget => {
                Err(PipelineError::Timeout { stage, budget })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        assert!(Deadline::unbounded().check("layout").is_ok());
    }

    #[test]
    fn test_zero_budget_expires() {
        let deadline = Deadline::new(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        let err = deadline.check("clustering").unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { stage: "clustering", .. }));
    }
}
