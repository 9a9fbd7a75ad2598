//! Wire types of the `generateContent` endpoint.

use serde::{Deserialize, Serialize};
use xylos_model::{ModelFinishReason, ModelMessage, ModelRequest};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Deserialize, Debug)]
pub struct ErrorDetail {
    pub message: String,
    pub status: Option<String>,
}

/// Extracts the message of an error body, falling back to `None` when the
/// body is not the JSON the server usually sends.
pub fn describe_error_body(body: &str) -> Option<String> {
    let ErrorBody { error } = serde_json::from_str(body).ok()?;
    Some(match error.status {
        Some(status) => format!("{} ({status})", error.message),
        None => error.message,
    })
}

impl Content {
    fn with_text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_owned),
            parts: vec![Part {
                text: text.to_owned(),
            }],
        }
    }

    /// Concatenates the text of all parts.
    pub fn text(&self) -> String {
        self.parts.iter().map(|part| part.text.as_str()).collect()
    }
}

pub fn create_request(req: &ModelRequest) -> GenerateContentRequest {
    let mut system_texts = Vec::new();
    let mut contents = Vec::with_capacity(req.messages.len());
    for message in &req.messages {
        match message {
            ModelMessage::System(text) => system_texts.push(text.as_str()),
            ModelMessage::User(text) => {
                contents.push(Content::with_text(Some("user"), text))
            }
            ModelMessage::Assistant(text) => {
                contents.push(Content::with_text(Some("model"), text))
            }
        }
    }

    let system_instruction = (!system_texts.is_empty())
        .then(|| Content::with_text(None, &system_texts.join("\n\n")));
    let generation_config = req
        .options
        .max_output_tokens
        .map(|max_output_tokens| GenerationConfig { max_output_tokens });

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

pub fn parse_finish_reason(reason: &str) -> ModelFinishReason {
    match reason {
        "MAX_TOKENS" => ModelFinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT"
        | "SPII" => ModelFinishReason::ContentFilter,
        _ => ModelFinishReason::Stop,
    }
}
