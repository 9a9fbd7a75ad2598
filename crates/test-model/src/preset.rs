use serde::{Deserialize, Serialize};
use xylos_model::{ErrorKind, ModelFinishReason};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    /// Breaks the response stream with an error of the given kind.
    #[serde(rename = "broken")]
    Broken(ErrorKind),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request itself is refused with this kind of error and
    /// no event is produced.
    pub rejection: Option<ErrorKind>,
    /// The reason reported when all events are delivered.
    pub finish_reason: ModelFinishReason,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            rejection: None,
            finish_reason: ModelFinishReason::Stop,
        }
    }

    /// Creates a `PresetResponse` whose whole text arrives in one delta.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a `PresetResponse` whose request fails up front.
    #[inline]
    pub fn rejected(kind: ErrorKind) -> Self {
        Self {
            events: vec![],
            rejection: Some(kind),
            finish_reason: ModelFinishReason::Stop,
        }
    }

    /// Sets the finish reason.
    #[inline]
    pub fn with_finish_reason(mut self, reason: ModelFinishReason) -> Self {
        self.finish_reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("I have left ".to_string()),
            PresetEvent::Broken(ErrorKind::Network),
        ])
        .with_finish_reason(ModelFinishReason::Length);

        let serialized = serde_json::to_string(&response).unwrap();
        assert!(serialized.contains(r#""type":"broken","data":"network""#));
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}
