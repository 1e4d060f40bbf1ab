// Circuit breaker guarding calls to an unreliable upstream dependency

use std::time::{Duration, Instant};

use tracing::{info, warn};

#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    reset_timeout: Duration,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    // A single trial call is in flight; a trial that never reports back
    // stops blocking once the reset timeout passes again
    HalfOpen { since: Instant },
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name,
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            state: State::Closed { failures: 0 },
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.state {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Whether a call may go upstream now. Once the reset timeout elapses an
    /// open breaker lets exactly one trial call through.
    pub fn should_allow_call(&mut self) -> bool {
        match self.state {
            State::Closed { .. } => true,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    info!(breaker = self.name, "circuit half-open, allowing trial call");
                    self.state = State::HalfOpen {
                        since: Instant::now(),
                    };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen { since } => {
                if since.elapsed() >= self.reset_timeout {
                    self.state = State::HalfOpen {
                        since: Instant::now(),
                    };
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn success(&mut self) {
        if !matches!(self.state, State::Closed { failures: 0 }) {
            info!(breaker = self.name, "circuit closed");
        }
        self.state = State::Closed { failures: 0 };
    }

    pub fn fail(&mut self) {
        match &mut self.state {
            State::Closed { failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    warn!(
                        breaker = self.name,
                        failures = *failures,
                        "circuit opened after consecutive failures"
                    );
                    self.state = State::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            State::HalfOpen { .. } => {
                warn!(breaker = self.name, "trial call failed, circuit re-opened");
                self.state = State::Open {
                    opened_at: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let mut breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        for _ in 0..2 {
            assert!(breaker.should_allow_call());
            breaker.fail();
        }
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.fail();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_allow_call());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut breaker = CircuitBreaker::new("test", 2, Duration::from_secs(60));
        breaker.fail();
        breaker.success();
        breaker.fail();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_allows_single_trial() {
        let mut breaker = CircuitBreaker::new("test", 1, Duration::from_millis(50));
        breaker.fail();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_allow_call());
        std::thread::sleep(Duration::from_millis(60));

        assert!(breaker.should_allow_call());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(!breaker.should_allow_call());

        breaker.success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.should_allow_call());
    }

    #[test]
    fn test_failed_trial_reopens() {
        let mut breaker = CircuitBreaker::new("test", 1, Duration::from_millis(20));
        breaker.fail();
        std::thread::sleep(Duration::from_millis(30));

        assert!(breaker.should_allow_call());
        breaker.fail();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_allow_call());
    }
}
