// src/session/mod.rs

use crate::agent::NextActionPlanner;
use crate::errors::{AgentError, ParseError};
use crate::llm::CompletionClient;
use crate::protocol::{HistoryEntry, ParsedAction, ParsedResponse, parse_response};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Action names that end a task run.
pub const FINISH_ACTION: &str = "finish";
pub const FAIL_ACTION: &str = "fail";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Success,
    Error,
    Interrupted,
}

/// What one step of the task loop produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A valid action was accepted and appended to the history.
    Accepted(ParsedResponse),
    /// The model answered, but the answer is not a valid action call.
    Rejected { response: String, error: ParseError },
    /// No request was made (missing credential).
    Unavailable,
    Interrupted,
    /// The session already ended; nothing was requested.
    Finished,
}

/// Cloneable stop switch for a running session.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Page-automation runtime the session drives.
pub trait PageDriver {
    /// Current simplified page content.
    fn snapshot(&mut self) -> String;
    /// Carries out a non-terminal action on the page.
    fn perform(&mut self, action: &ParsedAction) -> Result<(), String>;
}

/// One task run: instructions plus the append-only history of accepted
/// actions. Not meant to be stepped concurrently.
#[derive(Debug)]
pub struct TaskSession {
    instructions: String,
    history: Vec<HistoryEntry>,
    status: SessionStatus,
    interrupt: InterruptHandle,
}

impl TaskSession {
    pub fn new(instructions: &str) -> Self {
        Self {
            instructions: instructions.to_string(),
            history: Vec::new(),
            status: SessionStatus::Idle,
            interrupt: InterruptHandle::default(),
        }
    }

    /// Starts over with new instructions and an empty history.
    pub fn restart(&mut self, instructions: &str) {
        self.instructions = instructions.to_string();
        self.history.clear();
        self.status = SessionStatus::Idle;
        self.interrupt.reset();
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.status, SessionStatus::Idle | SessionStatus::Running)
    }

    /// Asks for, parses and records one action.
    pub fn next_step<C: CompletionClient>(
        &mut self,
        planner: &NextActionPlanner<C>,
        page_content: &str,
        notify: &mut dyn FnMut(&str),
    ) -> Result<StepOutcome, AgentError> {
        if self.is_finished() {
            return Ok(StepOutcome::Finished);
        }
        if self.interrupt.is_interrupted() {
            self.status = SessionStatus::Interrupted;
            return Ok(StepOutcome::Interrupted);
        }
        self.status = SessionStatus::Running;

        let next = match planner.determine_next_action(
            &self.instructions,
            &self.history,
            page_content,
            notify,
        ) {
            Ok(Some(next)) => next,
            Ok(None) => {
                self.status = SessionStatus::Error;
                return Ok(StepOutcome::Unavailable);
            }
            Err(err) => {
                self.status = SessionStatus::Error;
                return Err(err);
            }
        };

        match parse_response(&next.response, planner.registry()) {
            Ok(parsed) => {
                info!(step = self.history.len() + 1, action = %parsed.action, "accepted action");
                match parsed.parsed_action.name.as_str() {
                    FINISH_ACTION => self.status = SessionStatus::Success,
                    FAIL_ACTION => self.status = SessionStatus::Error,
                    _ => {}
                }
                self.history.push(parsed.clone());
                Ok(StepOutcome::Accepted(parsed))
            }
            Err(error) => {
                warn!(%error, "model response rejected");
                Ok(StepOutcome::Rejected {
                    response: next.response,
                    error,
                })
            }
        }
    }

    /// Steps until a terminal action, an invalid response, an interrupt or
    /// `max_steps` accepted actions.
    pub fn run<C: CompletionClient, D: PageDriver>(
        &mut self,
        planner: &NextActionPlanner<C>,
        driver: &mut D,
        max_steps: usize,
        notify: &mut dyn FnMut(&str),
    ) -> Result<SessionStatus, AgentError> {
        for _ in 0..max_steps {
            let page = driver.snapshot();
            match self.next_step(planner, &page, &mut *notify)? {
                StepOutcome::Accepted(parsed) => {
                    if self.is_finished() {
                        break;
                    }
                    if let Err(message) = driver.perform(&parsed.parsed_action) {
                        warn!(%message, action = %parsed.action, "action execution failed");
                        notify(&message);
                    }
                }
                StepOutcome::Rejected { error, .. } => {
                    notify(&error.to_string());
                    self.status = SessionStatus::Error;
                    break;
                }
                StepOutcome::Unavailable | StepOutcome::Interrupted | StepOutcome::Finished => break,
            }
        }

        if !self.is_finished() {
            self.status = SessionStatus::Error;
            warn!(max_steps, "step limit reached before the task finished");
        }
        Ok(self.status)
    }
}
