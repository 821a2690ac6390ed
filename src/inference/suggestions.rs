//! Follow-up question generation.
//!
//! Both providers ask the model for a JSON object constrained by the schema
//! below, accumulate the streamed text, then validate it here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::provider::RelayError;

/// Number of follow-up questions the relay must return.
pub const SUGGESTION_COUNT: usize = 3;

/// Starter prompts shown on the welcome screen before the first message.
pub const STARTER_SUGGESTIONS: [&str; SUGGESTION_COUNT] = [
    "What is AI and how does it work?",
    "Give me some tips for better sleep.",
    "How can I improve my productivity?",
];

/// Structured output expected from the model.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct SuggestionSet {
    /// Three concise questions addressed to an AI assistant.
    #[schemars(length(min = 3, max = 3))]
    pub suggestions: Vec<String>,
}

/// JSON schema for [`SuggestionSet`], with the meta-schema keys providers reject removed.
pub fn suggestion_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(SuggestionSet);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// The instruction sent to the model for a given user prompt.
pub fn suggestion_prompt(prompt: &str) -> String {
    format!(
        "You are an AI assistant that generates questions. With the following input: \"{prompt}\", \
         generate three concise and relevant questions about this topic.\n\n\
         - The question must be posed to an AI assistant.\n\
         - Do not ask questions directed at the user.\n"
    )
}

/// Parses the accumulated model output into exactly three non-empty questions.
pub fn parse_suggestions(raw: &str) -> Result<Vec<String>, RelayError> {
    let body = strip_code_fence(raw.trim());
    let set: SuggestionSet = serde_json::from_str(body)
        .map_err(|e| RelayError::Parse(format!("suggestions are not valid JSON: {e}")))?;

    let suggestions: Vec<String> = set
        .suggestions
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if suggestions.len() != SUGGESTION_COUNT {
        return Err(RelayError::Parse(format!(
            "expected {SUGGESTION_COUNT} suggestions, got {}",
            suggestions.len()
        )));
    }
    Ok(suggestions)
}

/// Some models wrap JSON output in a markdown fence despite the response format.
fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
