// src/protocol/mod.rs

use crate::errors::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod parser;
pub mod prompt;

pub use parser::parse_response;
pub use prompt::{build_system_preamble, build_user_prompt};

/// A typed argument value extracted from an action call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Number(f64),
    String(String),
}

impl ArgValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            ArgValue::Number(_) => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Number(n) => write!(f, "{n}"),
            ArgValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionArg {
    pub name: String,
    pub value: ArgValue,
}

/// A registry-validated action call. `args` follows the declared order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedAction {
    pub name: String,
    pub args: Vec<ActionArg>,
}

impl ParsedAction {
    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }
}

/// Successful parse of a model response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub thought: String,
    /// The raw call text found inside the action tag.
    pub action: String,
    pub parsed_action: ParsedAction,
}

/// A previously accepted step, re-serialized into every later prompt.
pub type HistoryEntry = ParsedResponse;

pub type ParseOutcome = Result<ParsedResponse, ParseError>;
