// src/protocol/prompt.rs

use crate::actions::ActionRegistry;
use crate::protocol::HistoryEntry;
use chrono::{DateTime, Local};

/// Renders the numbered action catalogue followed by the response-format
/// instructions. Deterministic for a given registry.
pub fn build_system_preamble(registry: &ActionRegistry) -> String {
    let formatted_actions = registry
        .list_actions()
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{}. {}: {}", i + 1, action.signature(), action.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
You are a browser automation assistant.

You can use the following tools:

{formatted_actions}

You will be be given a task to perform and the current state of the DOM. You will also be given previous actions that you have taken. You may retry a failed action up to one time.

This is an example of an action:

<Thought>I should click the add to cart button</Thought>
<Action>click(223)</Action>

You must always include the <Thought> and <Action> open/close tags or else your response will be marked as invalid."#
    )
}

/// Renders the per-step user prompt, stamped with the current local time.
pub fn build_user_prompt(
    task_instructions: &str,
    history: &[HistoryEntry],
    page_content: &str,
) -> String {
    build_user_prompt_at(task_instructions, history, page_content, Local::now())
}

pub fn build_user_prompt_at(
    task_instructions: &str,
    history: &[HistoryEntry],
    page_content: &str,
    now: DateTime<Local>,
) -> String {
    let previous_actions = if history.is_empty() {
        String::new()
    } else {
        let serialized = history
            .iter()
            .map(|entry| {
                format!(
                    "<Thought>{}</Thought>\n<Action>{}</Action>",
                    entry.thought, entry.action
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("You have already taken the following actions: \n{serialized}\n\n")
    };

    format!(
        r#"The user requests the following task:

{task_instructions}

{previous_actions}

Current time: {time}

Current page contents:
{page_content}"#,
        time = now.format("%-m/%-d/%Y, %-I:%M:%S %p"),
    )
}
