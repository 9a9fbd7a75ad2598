use std::time::Duration;

use xylos_model::{GenerationOptions, ModelProvider};

use super::{Chat, TurnCallback, TypingCallback};
use crate::conversation::{Conversation, DEFAULT_MAX_USER_TURNS, Turn};
use crate::model_client::ModelClient;

/// The default cap on the reply length, in tokens.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 200;

/// [`Chat`] builder.
pub struct ChatBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) max_user_turns: usize,
    pub(crate) max_output_tokens: Option<u32>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) failure_message: Option<String>,
    pub(crate) reply_delay: Option<Duration>,
    pub(crate) on_turn: Option<TurnCallback>,
    pub(crate) on_typing: Option<TypingCallback>,
}

impl ChatBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            max_user_turns: DEFAULT_MAX_USER_TURNS,
            max_output_tokens: Some(DEFAULT_MAX_OUTPUT_TOKENS),
            system_prompt: None,
            failure_message: None,
            reply_delay: None,
            on_turn: None,
            on_typing: None,
        }
    }

    /// Sets the cap on user turns.
    #[inline]
    pub fn with_max_user_turns(mut self, max_user_turns: usize) -> Self {
        self.max_user_turns = max_user_turns;
        self
    }

    /// Sets the cap on the reply length. `None` leaves it to the provider.
    #[inline]
    pub fn with_max_output_tokens(
        mut self,
        max_output_tokens: Option<u32>,
    ) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Sets the system prompt sent ahead of the conversation.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Uses a fixed text for error turns instead of the provider's error
    /// message.
    #[inline]
    pub fn with_failure_message<S: Into<String>>(mut self, message: S) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    /// Waits for the given duration before each request is sent, keeping
    /// the typing indicator up meanwhile.
    #[inline]
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    /// Attaches a callback to be invoked when a turn is appended.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.on_turn = Some(Box::new(on_turn));
        self
    }

    /// Attaches a callback to be invoked when the typing indicator goes
    /// up or down.
    #[inline]
    pub fn on_typing(
        mut self,
        on_typing: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_typing = Some(Box::new(on_typing));
        self
    }

    /// Builds the chat.
    #[inline]
    pub fn build(self) -> Chat {
        Chat::from_builder(self)
    }

    pub(crate) fn make_conversation(&mut self) -> Conversation {
        let conversation = Conversation::new(self.max_user_turns)
            .with_generation_options(GenerationOptions {
                max_output_tokens: self.max_output_tokens,
            });
        match self.system_prompt.take() {
            Some(prompt) => conversation.with_system_prompt(prompt),
            None => conversation,
        }
    }
}
