use thiserror::Error;

/// Raised when consecutive step failures reach the breaker threshold. It is
/// distinct from item-level errors: the workflow aborts and its BatchJob is
/// finalized FAILED with `stage = circuit_open`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("circuit open after {consecutive_failures} consecutive failures (threshold {threshold})")]
pub struct CircuitOpenError {
    pub consecutive_failures: u32,
    pub threshold: u32,
}

/// Per-workflow-run consecutive-failure counter. Successes reset it; the
/// failure that reaches the threshold opens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        CircuitBreaker {
            threshold: threshold.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) -> Result<(), CircuitOpenError> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            return Err(CircuitOpenError {
                consecutive_failures: self.consecutive_failures,
                threshold: self.threshold,
            });
        }
        Ok(())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_at_threshold() {
        let mut breaker = CircuitBreaker::new(5);
        for _ in 0..4 {
            assert!(breaker.record_failure().is_ok());
        }
        let err = breaker.record_failure().unwrap_err();
        assert_eq!(err.consecutive_failures, 5);
        assert_eq!(err.threshold, 5);
    }

    #[test]
    fn test_success_resets_counter() {
        let mut breaker = CircuitBreaker::new(3);
        breaker.record_failure().unwrap();
        breaker.record_failure().unwrap();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        breaker.record_failure().unwrap();
        breaker.record_failure().unwrap();
        assert!(breaker.record_failure().is_err());
    }
}
