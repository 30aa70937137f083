use crate::models::chat::Turn;

const HISTORY_HEADER: &str = "Previous conversation:\n";

/// Flatten prior turns and the new input into the single prompt text.
///
/// `prior_turns` must not contain the system turn; its content travels in the
/// separate instruction channel. Layout:
///
/// ```text
/// Previous conversation:
/// User: ...
///
/// Assistant: ...
///
///
/// User: <input>
///
/// Assistant:
/// ```
pub fn assemble_prompt(prior_turns: &[Turn], input: &str) -> String {
    let history_len: usize = prior_turns.iter().map(|t| t.content.len() + 16).sum();
    let mut prompt = String::with_capacity(HISTORY_HEADER.len() + history_len + input.len() + 32);

    prompt.push_str(HISTORY_HEADER);
    for turn in prior_turns {
        prompt.push_str(turn.role.label());
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push_str("\n\n");
    }

    prompt.push_str("\nUser: ");
    prompt.push_str(input);
    prompt.push_str("\n\nAssistant: ");
    prompt
}
