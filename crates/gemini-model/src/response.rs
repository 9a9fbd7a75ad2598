use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use xylos_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::proto::{GenerateContentResponse, parse_finish_reason};

/// A reply from the `generateContent` endpoint.
///
/// The endpoint answers in one piece, so the whole reply is delivered as a
/// single delta followed by the completion.
#[derive(Debug)]
pub struct GeminiResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl GeminiResponse {
    pub(crate) fn from_body(
        body: GenerateContentResponse,
    ) -> Result<Self, Error> {
        if let Some(reason) = body
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(Error::new(
                format!("prompt was blocked: {reason}"),
                ErrorKind::Moderated,
            ));
        }

        let Some(candidate) = body.candidates.into_iter().next() else {
            return Err(Error::new(
                "no candidate in the reply",
                ErrorKind::Provider,
            ));
        };
        let text = candidate.content.text();
        let finish_reason = candidate
            .finish_reason
            .as_deref()
            .map(parse_finish_reason)
            .unwrap_or(ModelFinishReason::Stop);
        let filtered = finish_reason == ModelFinishReason::ContentFilter;
        if text.is_empty() && filtered {
            return Err(Error::new(
                "reply was withheld by the safety filter",
                ErrorKind::Moderated,
            ));
        }

        let mut events = VecDeque::with_capacity(2);
        if !text.is_empty() {
            events.push_back(ModelResponseEvent::MessageDelta(text));
        }
        events.push_back(ModelResponseEvent::Completed(finish_reason));
        Ok(Self { events })
    }
}

impl ModelResponse for GeminiResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}
