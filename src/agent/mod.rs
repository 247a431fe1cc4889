// src/agent/mod.rs

//! Asks the completion service for the next browser action.
//!
//! Retries here cover only the completion call itself. A response that
//! fails to parse is returned to the caller as-is; the model's own
//! "retry a failed action once" instruction is a separate, semantic concept
//! handled by the model across steps.

use crate::actions::ActionRegistry;
use crate::context::AgentConfig;
use crate::errors::AgentError;
use crate::llm::{ClientError, CompletionClient, FaultKind, Usage};
use crate::protocol::{HistoryEntry, build_system_preamble, build_user_prompt};
use tracing::{debug, error, warn};

/// Raw result of a successful completion round-trip, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAction {
    pub usage: Usage,
    pub prompt: String,
    pub response: String,
}

enum AttemptResult {
    Completed(NextAction),
    TransientFailure(String),
    FatalFailure(String),
}

pub struct NextActionPlanner<C> {
    config: AgentConfig,
    registry: ActionRegistry,
    system_preamble: String,
    client: C,
}

impl<C: CompletionClient> NextActionPlanner<C> {
    pub fn new(config: AgentConfig, registry: ActionRegistry, client: C) -> Self {
        Self {
            system_preamble: build_system_preamble(&registry),
            config,
            registry,
            client,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn system_preamble(&self) -> &str {
        &self.system_preamble
    }

    /// Runs up to `config.max_attempts` completion calls.
    ///
    /// Returns `Ok(None)` without calling the service when no credential is
    /// configured. Transient faults are reported through `notify` and
    /// retried; a fatal fault aborts immediately. Pass `&mut |_: &str| {}`
    /// to ignore notifications.
    pub fn determine_next_action(
        &self,
        task_instructions: &str,
        history: &[HistoryEntry],
        page_content: &str,
        notify: &mut dyn FnMut(&str),
    ) -> Result<Option<NextAction>, AgentError> {
        if !self.config.has_credential() {
            warn!("no API key configured, skipping completion request");
            notify("No API key found");
            return Ok(None);
        }

        let max_attempts = self.config.max_attempts;
        for attempt in 0..max_attempts {
            let prompt = build_user_prompt(task_instructions, history, page_content);
            debug!(attempt, prompt_len = prompt.len(), "requesting next action");

            match self.attempt(prompt) {
                AttemptResult::Completed(next) => return Ok(Some(next)),
                AttemptResult::TransientFailure(message) => {
                    warn!(attempt, %message, "transient completion failure");
                    notify(&message);
                }
                AttemptResult::FatalFailure(message) => {
                    error!(attempt, %message, "fatal completion failure");
                    return Err(AgentError::fatal(message));
                }
            }
        }

        Err(AgentError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    fn attempt(&self, prompt: String) -> AttemptResult {
        match self.client.send(&self.system_preamble, &prompt) {
            Ok(completion) => AttemptResult::Completed(NextAction {
                usage: completion.usage,
                prompt,
                response: completion.text,
            }),
            Err(ClientError {
                kind: FaultKind::Transient,
                message,
            }) => AttemptResult::TransientFailure(message),
            Err(ClientError {
                kind: FaultKind::Fatal,
                message,
            }) => AttemptResult::FatalFailure(message),
        }
    }
}
