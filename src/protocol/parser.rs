// src/protocol/parser.rs

//! Turns free-text model output into a registry-validated action call.
//!
//! The expected shape is:
//!
//! ```text
//! <Thought>I should click the add to cart button</Thought>
//! <Action>click(223)</Action>
//! ```
//!
//! Tag extraction is regex based and deliberately narrow:
//! - the first occurrence of each tag wins; later duplicates are ignored
//! - tags are not nested; the first closing tag ends the content
//! - tag content is a single line; a tag whose content crosses a newline
//!   is treated as missing
//! - the argument list ends at the first `)`, so quoted values cannot
//!   contain a closing parenthesis or a comma (no escape processing)

use crate::actions::{ActionRegistry, ArgSpec, ArgType};
use crate::errors::ParseError;
use crate::protocol::{ActionArg, ArgValue, ParseOutcome, ParsedAction, ParsedResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static THOUGHT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Thought>(.*?)</Thought>").expect("thought regex"));
static ACTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Action>(.*?)</Action>").expect("action regex"));
static CALL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9_]+)\((.*?)\)").expect("call regex"));

const QUOTES: [char; 3] = ['"', '\'', '`'];

/// Parses `text` against `registry`. Never panics; every failure is returned
/// as a [`ParseError`].
pub fn parse_response(text: &str, registry: &ActionRegistry) -> ParseOutcome {
    let thought = capture(&THOUGHT_REGEX, text).ok_or(ParseError::MissingThought)?;
    let action_text = capture(&ACTION_REGEX, text).ok_or(ParseError::MissingAction)?;

    let call = CALL_REGEX
        .captures(action_text)
        .ok_or(ParseError::InvalidFormat)?;
    let name = call.get(1).map_or("", |m| m.as_str());
    let args_text = call.get(2).map_or("", |m| m.as_str());
    debug!(action = action_text, action_name = name, args = args_text, "matched action call");

    let spec = registry
        .find(name)
        .ok_or_else(|| ParseError::UnknownAction {
            name: name.to_string(),
        })?;

    let raw_args = split_args(args_text);
    if raw_args.len() != spec.arity() {
        return Err(ParseError::ArgumentCount {
            action: name.to_string(),
            expected: spec.arity(),
            actual: raw_args.len(),
        });
    }

    let args = spec
        .args
        .iter()
        .zip(raw_args)
        .map(|(arg_spec, raw)| convert_arg(arg_spec, raw))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(?args, "parsed action arguments");

    Ok(ParsedResponse {
        thought: thought.to_string(),
        action: action_text.to_string(),
        parsed_action: ParsedAction {
            name: spec.name.clone(),
            args,
        },
    })
}

fn capture<'t>(regex: &Regex, text: &'t str) -> Option<&'t str> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Splits on commas, trimming each piece. Empty pieces are dropped, so
/// `click(223,)` and `click(223)` are equivalent and `finish()` has no args.
fn split_args(args_text: &str) -> Vec<&str> {
    args_text
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .collect()
}

fn convert_arg(spec: &ArgSpec, raw: &str) -> Result<ActionArg, ParseError> {
    let mismatch = || ParseError::ArgumentType {
        arg: spec.name.clone(),
        expected: spec.arg_type.as_str(),
        got: raw.to_string(),
    };

    let value = match spec.arg_type {
        ArgType::Number => raw
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ArgValue::Number)
            .ok_or_else(mismatch)?,
        ArgType::String => unquote(raw)
            .map(|s| ArgValue::String(s.to_string()))
            .ok_or_else(mismatch)?,
    };

    Ok(ActionArg {
        name: spec.name.clone(),
        value,
    })
}

/// Strips one matching pair of `"`, `'` or `` ` `` quotes.
fn unquote(raw: &str) -> Option<&str> {
    let mut chars = raw.chars();
    let open = chars.next()?;
    let close = chars.next_back()?;
    if QUOTES.contains(&open) && open == close {
        Some(&raw[open.len_utf8()..raw.len() - close.len_utf8()])
    } else {
        None
    }
}
