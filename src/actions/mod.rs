// src/actions/mod.rs

use crate::errors::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Type of a positional action argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Number,
    String,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::Number => "number",
            ArgType::String => "string",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
}

impl ArgSpec {
    pub fn number(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arg_type: ArgType::Number,
        }
    }

    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arg_type: ArgType::String,
        }
    }
}

/// A permitted action and its typed argument signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

impl ActionSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Renders `name(arg1: type, arg2: type)`.
    pub fn signature(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| format!("{}: {}", arg.name, arg.arg_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, args)
    }
}

/// Immutable catalogue of the actions the model is allowed to request.
///
/// Order of definition is kept: it drives the numbering in the system
/// preamble. Names are unique, enforced at construction.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: Vec<ActionSpec>,
}

impl ActionRegistry {
    pub fn new(actions: Vec<ActionSpec>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for action in &actions {
            if action.name.is_empty()
                || !action
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(RegistryError::InvalidName(action.name.clone()));
            }
            if !seen.insert(action.name.as_str()) {
                return Err(RegistryError::DuplicateAction(action.name.clone()));
            }
        }
        Ok(Self { actions })
    }

    /// Parses a JSON array of `{name, description, args: [{name, type}]}`.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let actions: Vec<ActionSpec> =
            serde_json::from_str(json).map_err(|e| RegistryError::Load(e.to_string()))?;
        Self::new(actions)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn list_actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub fn find(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|action| action.name == name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    /// The browser actions understood by the page-automation runtime.
    fn default() -> Self {
        Self {
            actions: vec![
                ActionSpec::new("click", "Clicks on an element")
                    .arg(ArgSpec::number("elementId")),
                ActionSpec::new("setValue", "Focuses on and sets the value of an input element")
                    .arg(ArgSpec::number("elementId"))
                    .arg(ArgSpec::string("value")),
                ActionSpec::new("finish", "Indicates the task is finished"),
                ActionSpec::new("fail", "Indicates that you are unable to complete the task"),
            ],
        }
    }
}
