// src/errors.rs

use thiserror::Error;

/// Errors raised while building an action registry.
///
/// These are configuration faults: a registry that fails to build is never
/// usable, so callers are expected to abort at start-up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate action name in registry: \"{0}\"")]
    DuplicateAction(String),

    #[error("action names must be non-empty word identifiers, got \"{0}\"")]
    InvalidName(String),

    #[error("failed to load action registry: {0}")]
    Load(String),
}

/// Reasons a model response could not be turned into a registry-valid call.
///
/// Returned as data from the parser, never raised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid response: Thought not found in the model response.")]
    MissingThought,

    #[error("Invalid response: Action not found in the model response.")]
    MissingAction,

    #[error(
        "Invalid action format: Action should be in the format functionName(arg1, arg2, ...)."
    )]
    InvalidFormat,

    #[error("Invalid action: \"{name}\" is not a valid action.")]
    UnknownAction { name: String },

    #[error(
        "Invalid number of arguments: Expected {expected} for action \"{action}\", but got {actual}."
    )]
    ArgumentCount {
        action: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid argument type: Expected a {expected} for argument \"{arg}\", but got \"{got}\".")]
    ArgumentType {
        arg: String,
        expected: &'static str,
        got: String,
    },
}

/// Terminal failures of the next-action orchestrator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The completion service rejected the request in a way retrying cannot fix.
    #[error("{0}")]
    Fatal(String),

    #[error("Failed to complete query after {attempts} attempts. Please try again later.")]
    RetriesExhausted { attempts: u32 },
}

impl AgentError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}
