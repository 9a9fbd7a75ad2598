use serde::{Deserialize, Serialize};
use xylos_model::{ModelFinishReason, ModelMessage, ModelRequest};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: Option<String>,
}

/// Extracts the message of an error body, falling back to `None` when the
/// body is not the JSON the server usually sends.
pub fn describe_error_body(body: &str) -> Option<String> {
    let ErrorBody { error } = serde_json::from_str(body).ok()?;
    Some(match error.code {
        Some(code) => format!("{} ({code})", error.message),
        None => error.message,
    })
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        max_tokens: req.options.max_output_tokens,
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: content.clone(),
        },
    }
}

#[inline]
pub fn parse_finish_reason(reason: &str) -> ModelFinishReason {
    match reason {
        "length" => ModelFinishReason::Length,
        "content_filter" => ModelFinishReason::ContentFilter,
        _ => ModelFinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use xylos_model::GenerationOptions;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_describe_error_body() {
        let body = r#"{"error":{"message":"Rate limit","code":"rate_limit"}}"#;
        assert_eq!(
            describe_error_body(body).as_deref(),
            Some("Rate limit (rate_limit)")
        );
        assert_eq!(
            describe_error_body(r#"{"error":{"message":"Bad key"}}"#)
                .as_deref(),
            Some("Bad key")
        );
        assert_eq!(describe_error_body("<html>oops</html>"), None);
    }

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You are a helpful assistant.".to_owned()),
                ModelMessage::User("Hello".to_owned()),
                ModelMessage::Assistant("Hi!".to_owned()),
                ModelMessage::User("Bye".to_owned()),
            ],
            options: GenerationOptions {
                max_output_tokens: Some(200),
            },
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let wire = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            wire,
            json!({
                "model": "custom",
                "messages": [
                    {
                        "role": "system",
                        "content": "You are a helpful assistant.",
                    },
                    { "role": "user", "content": "Hello" },
                    { "role": "assistant", "content": "Hi!" },
                    { "role": "user", "content": "Bye" },
                ],
                "max_tokens": 200,
                "stream": true,
            })
        );
    }

    #[test]
    fn test_no_max_tokens() {
        let request = ModelRequest {
            messages: vec![ModelMessage::User("Hello".to_owned())],
            options: GenerationOptions::default(),
        };
        let config = OpenAIConfigBuilder::without_api_key().build();
        let wire = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert!(wire.get("max_tokens").is_none());
    }
}
