//! Turns a task instruction and a page snapshot into one validated browser
//! action by prompting a remote completion service.
//!
//! The pipeline runs one way: [`protocol::build_user_prompt`] renders the
//! request, [`agent::NextActionPlanner`] sends it with bounded retries, and
//! [`protocol::parse_response`] reduces the free-text answer to a call from
//! the [`actions::ActionRegistry`].

pub mod actions;
pub mod agent;
pub mod context;
pub mod errors;
pub mod llm;
pub mod protocol;
pub mod session;
pub mod telemetry;

pub use actions::{ActionRegistry, ActionSpec, ArgSpec, ArgType};
pub use agent::{NextAction, NextActionPlanner};
pub use context::{AgentConfig, Provider};
pub use errors::{AgentError, ParseError, RegistryError};
pub use llm::{ClientError, Completion, CompletionClient, FaultKind, Usage};
pub use protocol::{
    ActionArg, ArgValue, HistoryEntry, ParseOutcome, ParsedAction, ParsedResponse,
    build_system_preamble, build_user_prompt, parse_response,
};
pub use session::{InterruptHandle, PageDriver, SessionStatus, StepOutcome, TaskSession};
