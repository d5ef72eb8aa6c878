// src/engine/core.rs

//! Pure validation state machine.
//!
//! `ValidationCore` consumes [`StepEvent`]s describing what the IO shell
//! observed and returns the next [`StepAction`] to perform. It owns:
//! - the current [`ValidationState`] and the trace of visited states
//! - the launch attempt counter and its cap
//!
//! It has **no** Tokio types, processes or files, so every transition is
//! unit tested directly.

use crate::engine::{LaunchFailure, ValidationResult, ValidationState};
use crate::errors::{PitError, Result};
use crate::types::Mode;

/// Why the launch marker was not seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerMiss {
    TimedOut,
    ProcessDied,
}

/// Observations fed into the core by the IO shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Begin { port_busy: bool },
    Compiled { exit_code: i32 },
    Launched,
    DeadOnArrival { exit_code: Option<i32> },
    MarkerFound,
    MarkerMissed { reason: MarkerMiss, config_rewritten: bool },
    Ready,
    NotReady { config_rewritten: bool },
    BundleChecked { found: bool, config_rewritten: bool },
    TestsFinished { passed: bool },
    Restarted,
    Interrupted,
}

/// What the IO shell should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Compile,
    Launch,
    AwaitMarker,
    AwaitReady,
    /// Dev mode only; best-effort.
    AwaitBundle,
    RunTests,
    /// Stop the run-process, keep the old sink as a backup and start over.
    /// `attempt` is the number of the launch about to happen.
    Restart { attempt: u32 },
    /// Tear down and report.
    Finish(ValidationResult),
}

#[derive(Debug, Clone)]
pub struct ValidationCore {
    mode: Mode,
    runs_tests: bool,
    max_attempts: u32,
    attempt: u32,
    state: ValidationState,
    bundle_pending: bool,
    trace: Vec<ValidationState>,
}

impl ValidationCore {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(mode: Mode, runs_tests: bool, max_attempts: u32) -> Self {
        Self {
            mode,
            runs_tests,
            max_attempts: max_attempts.max(1),
            attempt: 0,
            state: ValidationState::Idle,
            bundle_pending: false,
            trace: vec![ValidationState::Idle],
        }
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// Launches started so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn trace(&self) -> &[ValidationState] {
        &self.trace
    }

    pub fn is_finished(&self) -> bool {
        self.state == ValidationState::TornDown
    }

    /// Apply one event and return the next action.
    pub fn step(&mut self, event: StepEvent) -> Result<StepAction> {
        use ValidationState as S;

        if event == StepEvent::Interrupted && self.state != S::TornDown {
            return Ok(self.finish(ValidationResult::Interrupted));
        }

        match (self.state, event) {
            (S::Idle, StepEvent::Begin { port_busy: true }) => {
                Ok(self.finish(ValidationResult::LaunchFailed(LaunchFailure::PortBusy)))
            }
            (S::Idle, StepEvent::Begin { port_busy: false }) => {
                self.enter(S::Compiling);
                Ok(StepAction::Compile)
            }

            (S::Compiling, StepEvent::Compiled { exit_code: 0 }) => Ok(self.launch()),
            (S::Compiling, StepEvent::Compiled { exit_code }) => {
                Ok(self.finish(ValidationResult::CompileFailed { exit_code }))
            }

            (S::Launching, StepEvent::Launched) => {
                self.enter(S::AwaitingMarker);
                Ok(StepAction::AwaitMarker)
            }
            (S::Launching, StepEvent::DeadOnArrival { exit_code }) => Ok(self.finish(
                ValidationResult::LaunchFailed(LaunchFailure::DeadOnArrival { exit_code }),
            )),

            (S::AwaitingMarker, StepEvent::MarkerFound) => {
                self.enter(S::AwaitingReady);
                Ok(StepAction::AwaitReady)
            }
            (S::AwaitingMarker, StepEvent::MarkerMissed { config_rewritten: true, .. }) => {
                Ok(self.restart())
            }
            (S::AwaitingMarker, StepEvent::MarkerMissed { reason, .. }) => {
                let failure = match reason {
                    MarkerMiss::TimedOut => LaunchFailure::MarkerTimedOut,
                    MarkerMiss::ProcessDied => LaunchFailure::ProcessDied,
                };
                Ok(self.finish(ValidationResult::LaunchFailed(failure)))
            }

            (S::AwaitingReady, StepEvent::Ready) if !self.bundle_pending => {
                if self.mode == Mode::Dev {
                    self.bundle_pending = true;
                    Ok(StepAction::AwaitBundle)
                } else {
                    Ok(self.to_testing())
                }
            }
            (S::AwaitingReady, StepEvent::NotReady { config_rewritten }) if !self.bundle_pending => {
                if config_rewritten {
                    Ok(self.restart())
                } else {
                    Ok(self.finish(ValidationResult::ReadinessTimeout))
                }
            }
            (S::AwaitingReady, StepEvent::BundleChecked { found, config_rewritten })
                if self.bundle_pending =>
            {
                self.bundle_pending = false;
                if !found && config_rewritten {
                    Ok(self.restart())
                } else {
                    // A missing bundle marker alone is not a failure.
                    Ok(self.to_testing())
                }
            }

            (S::Testing, StepEvent::TestsFinished { passed }) => Ok(self.finish(if passed {
                ValidationResult::Passed
            } else {
                ValidationResult::TestsFailed
            })),

            (S::RestartingAfterRewrite, StepEvent::Restarted) => Ok(self.launch()),

            (state, event) => Err(PitError::InvalidTransition {
                state,
                event: format!("{event:?}"),
            }),
        }
    }

    fn enter(&mut self, state: ValidationState) {
        self.state = state;
        self.trace.push(state);
    }

    fn launch(&mut self) -> StepAction {
        self.attempt += 1;
        self.enter(ValidationState::Launching);
        StepAction::Launch
    }

    fn restart(&mut self) -> StepAction {
        self.enter(ValidationState::RestartingAfterRewrite);
        if self.attempt >= self.max_attempts {
            return self.finish(ValidationResult::ConfigRewriteExhausted {
                attempts: self.attempt,
            });
        }
        StepAction::Restart {
            attempt: self.attempt + 1,
        }
    }

    fn to_testing(&mut self) -> StepAction {
        if self.runs_tests {
            self.enter(ValidationState::Testing);
            StepAction::RunTests
        } else {
            self.finish(ValidationResult::Passed)
        }
    }

    fn finish(&mut self, result: ValidationResult) -> StepAction {
        self.bundle_pending = false;
        self.enter(ValidationState::TornDown);
        StepAction::Finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ValidationState as S;

    fn run(core: &mut ValidationCore, events: &[StepEvent]) -> StepAction {
        let mut last = None;
        for e in events {
            last = Some(core.step(*e).unwrap());
        }
        last.unwrap()
    }

    #[test]
    fn happy_path_prod_with_tests() {
        let mut core = ValidationCore::new(Mode::Prod, true, 3);
        let action = run(
            &mut core,
            &[
                StepEvent::Begin { port_busy: false },
                StepEvent::Compiled { exit_code: 0 },
                StepEvent::Launched,
                StepEvent::MarkerFound,
                StepEvent::Ready,
                StepEvent::TestsFinished { passed: true },
            ],
        );
        assert_eq!(action, StepAction::Finish(ValidationResult::Passed));
        assert_eq!(
            core.trace(),
            &[
                S::Idle,
                S::Compiling,
                S::Launching,
                S::AwaitingMarker,
                S::AwaitingReady,
                S::Testing,
                S::TornDown
            ]
        );
        assert_eq!(core.attempts(), 1);
    }

    #[test]
    fn dev_mode_waits_for_bundle_and_tolerates_missing_marker() {
        let mut core = ValidationCore::new(Mode::Dev, false, 3);
        run(
            &mut core,
            &[
                StepEvent::Begin { port_busy: false },
                StepEvent::Compiled { exit_code: 0 },
                StepEvent::Launched,
                StepEvent::MarkerFound,
            ],
        );
        assert_eq!(core.step(StepEvent::Ready).unwrap(), StepAction::AwaitBundle);
        assert_eq!(
            core.step(StepEvent::BundleChecked {
                found: false,
                config_rewritten: false
            })
            .unwrap(),
            StepAction::Finish(ValidationResult::Passed)
        );
    }

    #[test]
    fn compile_failure_never_launches() {
        let mut core = ValidationCore::new(Mode::Prod, true, 3);
        let action = run(
            &mut core,
            &[
                StepEvent::Begin { port_busy: false },
                StepEvent::Compiled { exit_code: 1 },
            ],
        );
        assert_eq!(
            action,
            StepAction::Finish(ValidationResult::CompileFailed { exit_code: 1 })
        );
        assert_eq!(core.attempts(), 0);
        assert!(!core.trace().contains(&S::Launching));
    }

    #[test]
    fn busy_port_fails_before_compiling() {
        let mut core = ValidationCore::new(Mode::Prod, true, 3);
        assert_eq!(
            core.step(StepEvent::Begin { port_busy: true }).unwrap(),
            StepAction::Finish(ValidationResult::LaunchFailed(LaunchFailure::PortBusy))
        );
        assert_eq!(core.trace(), &[S::Idle, S::TornDown]);
    }

    #[test]
    fn rewrite_restarts_until_cap() {
        let mut core = ValidationCore::new(Mode::Prod, false, 3);
        run(
            &mut core,
            &[
                StepEvent::Begin { port_busy: false },
                StepEvent::Compiled { exit_code: 0 },
                StepEvent::Launched,
                StepEvent::MarkerFound,
            ],
        );

        let rewritten = StepEvent::NotReady {
            config_rewritten: true,
        };
        assert_eq!(core.step(rewritten).unwrap(), StepAction::Restart { attempt: 2 });
        run(
            &mut core,
            &[StepEvent::Restarted, StepEvent::Launched, StepEvent::MarkerFound],
        );
        assert_eq!(core.step(rewritten).unwrap(), StepAction::Restart { attempt: 3 });
        run(
            &mut core,
            &[StepEvent::Restarted, StepEvent::Launched, StepEvent::MarkerFound],
        );
        assert_eq!(
            core.step(rewritten).unwrap(),
            StepAction::Finish(ValidationResult::ConfigRewriteExhausted { attempts: 3 })
        );
        assert_eq!(core.attempts(), 3);
    }

    #[test]
    fn marker_miss_without_rewrite_is_launch_failure() {
        let mut core = ValidationCore::new(Mode::Prod, false, 3);
        let action = run(
            &mut core,
            &[
                StepEvent::Begin { port_busy: false },
                StepEvent::Compiled { exit_code: 0 },
                StepEvent::Launched,
                StepEvent::MarkerMissed {
                    reason: MarkerMiss::ProcessDied,
                    config_rewritten: false,
                },
            ],
        );
        assert_eq!(
            action,
            StepAction::Finish(ValidationResult::LaunchFailed(LaunchFailure::ProcessDied))
        );
    }

    #[test]
    fn interrupt_from_any_live_state() {
        let mut core = ValidationCore::new(Mode::Dev, true, 3);
        run(
            &mut core,
            &[
                StepEvent::Begin { port_busy: false },
                StepEvent::Compiled { exit_code: 0 },
            ],
        );
        assert_eq!(
            core.step(StepEvent::Interrupted).unwrap(),
            StepAction::Finish(ValidationResult::Interrupted)
        );
        assert!(core.is_finished());
    }

    #[test]
    fn events_after_teardown_are_rejected() {
        let mut core = ValidationCore::new(Mode::Prod, false, 3);
        core.step(StepEvent::Begin { port_busy: true }).unwrap();
        let err = core.step(StepEvent::Interrupted).unwrap_err();
        assert!(matches!(
            err,
            PitError::InvalidTransition {
                state: S::TornDown,
                ..
            }
        ));
        assert!(core.step(StepEvent::Launched).is_err());
    }

    #[test]
    fn out_of_order_event_is_rejected() {
        let mut core = ValidationCore::new(Mode::Prod, false, 3);
        assert!(core.step(StepEvent::MarkerFound).is_err());
        assert_eq!(core.state(), S::Idle);
    }
}
