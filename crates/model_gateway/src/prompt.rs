//! Prompt composition for the vision model.

use photo_advisor_core::types::DEFAULT_PROMPT;

/// Answer structure appended to every prompt.
pub const ANSWER_TEMPLATE: &str = "\
Answer in plain language. Be concise and practical, use short sentences and \
avoid speculation beyond what the photo shows. Structure the answer in exactly \
these five parts:
1. What is the problem
2. Possible cause
3. Immediate next steps
4. What to avoid
5. When to seek expert help";

/// Combine the user's text with the fixed answer template.
///
/// Blank input falls back to the default prompt.
pub fn compose_prompt(user_prompt: &str) -> String {
    let user_prompt = match user_prompt.trim() {
        "" => DEFAULT_PROMPT,
        trimmed => trimmed,
    };
    format!("{}\n\n{}", user_prompt, ANSWER_TEMPLATE)
}
