use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use xylos_model::{
    ErrorKind, GenerationOptions, ModelFinishReason, ModelMessage,
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};

#[derive(Debug)]
struct EchoProviderError(ErrorKind);

impl Display for EchoProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoProviderError {}

impl ModelProviderError for EchoProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last user message word by word, stopping early once the
/// word budget from `max_output_tokens` is used up.
#[derive(Debug)]
struct EchoResponse {
    words: VecDeque<String>,
    truncated: bool,
    completed: bool,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl EchoResponse {
    fn new(input: &str, options: GenerationOptions) -> Self {
        let mut words: VecDeque<String> = format!("You said {input}")
            .split(' ')
            .map(ToString::to_string)
            .collect();
        let mut truncated = false;
        if let Some(max) = options.max_output_tokens {
            let max = max as usize;
            if words.len() > max {
                words.truncate(max);
                truncated = true;
            }
        }
        Self {
            words,
            truncated,
            completed: false,
            sleep: None,
        }
    }
}

impl ModelResponse for EchoResponse {
    type Error = EchoProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            if let Some(mut word) = this.words.pop_front() {
                if !this.words.is_empty() {
                    word.push(' ');
                }
                return Poll::Ready(Ok(Some(
                    ModelResponseEvent::MessageDelta(word),
                )));
            }
            if !this.completed {
                this.completed = true;
                let reason = if this.truncated {
                    ModelFinishReason::Length
                } else {
                    ModelFinishReason::Stop
                };
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    reason,
                ))));
            }
            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = EchoProviderError;
    type Response = EchoResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.as_str()),
            _ => None,
        });
        let result = match last_user {
            Some(text) => Ok(EchoResponse::new(text, req.options)),
            None => Err(EchoProviderError(ErrorKind::Provider)),
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    async fn collect(mut resp: EchoResponse) -> (String, ModelFinishReason) {
        let mut text = String::new();
        let mut finish_reason = None;
        loop {
            let event =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx)).await;
            match event {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    text.push_str(&delta);
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    finish_reason = Some(reason);
                }
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }
        (text, finish_reason.unwrap())
    }

    #[tokio::test]
    async fn test_completion() {
        let req = ModelRequest {
            messages: vec![
                ModelMessage::System("Be brief.".to_string()),
                ModelMessage::User("Good morning".to_string()),
            ],
            options: GenerationOptions::default(),
        };
        let resp = EchoProvider.send_request(&req).await.unwrap();
        let (text, reason) = collect(resp).await;
        assert_eq!(text, "You said Good morning");
        assert_eq!(reason, ModelFinishReason::Stop);
    }

    #[tokio::test]
    async fn test_max_output_tokens() {
        let req = ModelRequest {
            messages: vec![ModelMessage::User("a b c d e".to_string())],
            options: GenerationOptions {
                max_output_tokens: Some(3),
            },
        };
        let resp = EchoProvider.send_request(&req).await.unwrap();
        let (text, reason) = collect(resp).await;
        assert_eq!(text, "You said a");
        assert_eq!(reason, ModelFinishReason::Length);
    }

    #[tokio::test]
    async fn test_error() {
        let req = ModelRequest {
            messages: vec![ModelMessage::Assistant("hello".to_string())],
            options: GenerationOptions::default(),
        };
        let err = EchoProvider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(!err.kind().is_transient());
    }
}
