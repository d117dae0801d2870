//! Pulling generated text and token usage out of provider responses.
//!
//! Providers return text in more than one shape. Each shape is a
//! [`ContentStrategy`]; strategies are tried in [`STRATEGIES`] order and the
//! first non-empty result wins.

use serde::Deserialize;
use serde_json::Value;

/// One way of locating generated text in a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStrategy {
    /// Top-level `output_text` convenience field.
    OutputText,
    /// `output[]` item of type `message`, first `content[]` entry with `text`.
    MessageItem,
    /// Chat-completions style `choices[0].message.content`.
    ChatChoice,
}

/// Strategies in the order they are attempted.
pub const STRATEGIES: &[ContentStrategy] = &[
    ContentStrategy::OutputText,
    ContentStrategy::MessageItem,
    ContentStrategy::ChatChoice,
];

impl ContentStrategy {
    /// Apply this strategy. Empty or whitespace-only text counts as absent.
    pub fn extract(&self, body: &Value) -> Option<String> {
        let text = match self {
            Self::OutputText => body.get("output_text").and_then(Value::as_str),
            Self::MessageItem => body
                .get("output")
                .and_then(Value::as_array)
                .and_then(|items| {
                    items
                        .iter()
                        .find(|item| item.get("type").and_then(Value::as_str) == Some("message"))
                })
                .and_then(|message| message.get("content").and_then(Value::as_array))
                .and_then(|parts| {
                    parts
                        .iter()
                        .find_map(|part| part.get("text").and_then(Value::as_str))
                }),
            Self::ChatChoice => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str),
        };

        text.filter(|t| !t.trim().is_empty()).map(String::from)
    }
}

/// First non-empty text found by any strategy, with the strategy that found it.
pub fn extract_content(body: &Value) -> Option<(ContentStrategy, String)> {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy.extract(body).map(|text| (*strategy, text)))
}

/// Token accounting for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// Read `usage` from a response body. Missing or malformed usage is zero.
    pub fn from_response(body: &Value) -> Self {
        #[derive(Deserialize, Default)]
        struct RawUsage {
            #[serde(default, alias = "prompt_tokens")]
            input_tokens: u64,
            #[serde(default, alias = "completion_tokens")]
            output_tokens: u64,
        }

        let raw = body
            .get("usage")
            .cloned()
            .and_then(|u| serde_json::from_value::<RawUsage>(u).ok())
            .unwrap_or_default();

        Self::new(raw.input_tokens, raw.output_tokens)
    }
}

impl std::ops::Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage::new(
            self.input_tokens + rhs.input_tokens,
            self.output_tokens + rhs.output_tokens,
        )
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_item_shape() {
        let body = json!({
            "output": [
                { "type": "web_search_call", "status": "completed" },
                { "type": "message", "content": [{ "type": "output_text", "text": "## Overview\nHi" }] }
            ]
        });
        let (strategy, text) = extract_content(&body).unwrap();
        assert_eq!(strategy, ContentStrategy::MessageItem);
        assert_eq!(text, "## Overview\nHi");
    }

    #[test]
    fn output_text_wins_over_message_item() {
        let body = json!({
            "output_text": "top level",
            "output": [{ "type": "message", "content": [{ "text": "nested" }] }]
        });
        assert_eq!(
            extract_content(&body),
            Some((ContentStrategy::OutputText, "top level".to_string()))
        );
    }

    #[test]
    fn empty_field_falls_through_to_next_strategy() {
        let body = json!({
            "output_text": "   ",
            "choices": [{ "message": { "content": "chat shape" } }]
        });
        assert_eq!(
            extract_content(&body),
            Some((ContentStrategy::ChatChoice, "chat shape".to_string()))
        );
    }

    #[test]
    fn unrecognized_shape_yields_none() {
        assert_eq!(extract_content(&json!({ "id": "resp_1", "output": [] })), None);
        assert_eq!(extract_content(&json!("just a string")), None);
    }

    #[test]
    fn usage_accepts_both_naming_schemes() {
        let usage = TokenUsage::from_response(&json!({ "usage": { "input_tokens": 120, "output_tokens": 80 } }));
        assert_eq!(usage, TokenUsage::new(120, 80));
        assert_eq!(usage.total_tokens, 200);

        let usage = TokenUsage::from_response(&json!({ "usage": { "prompt_tokens": 5, "completion_tokens": 7 } }));
        assert_eq!(usage, TokenUsage::new(5, 7));

        assert_eq!(TokenUsage::from_response(&json!({})), TokenUsage::default());
    }

    #[test]
    fn usage_adds_up() {
        let mut total = TokenUsage::default();
        total += TokenUsage::new(10, 20);
        total += TokenUsage::new(1, 2);
        assert_eq!(total, TokenUsage::new(11, 22));
        assert_eq!(total.total_tokens, 33);
    }
}
