//! Conversation-related types.
//!
//! [`Conversation`] is the turn-taking state machine of a chat. It owns the
//! ordered list of turns, caps the number of user turns and tracks whether a
//! reply is being awaited. It never talks to a provider itself: a successful
//! [`Conversation::submit`] hands back the [`ModelRequest`] to send, and the
//! caller reports the outcome with [`Conversation::on_reply_success`] or
//! [`Conversation::on_reply_failure`].

#[cfg(test)]
mod proptests;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xylos_model::{GenerationOptions, ModelMessage, ModelRequest};

/// The default cap on user turns per conversation.
pub const DEFAULT_MAX_USER_TURNS: usize = 10;

/// The speaker category of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// A reply from the completion provider.
    Assistant,
    /// A failed request, rendered in place of the reply.
    Error,
}

/// One message unit in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Creates a new turn.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Returns the role of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this turn.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// The stage of a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    /// No request is outstanding.
    #[default]
    Idle,
    /// One request is outstanding.
    AwaitingReply,
}

/// The reason a submission was not accepted.
///
/// Rejections leave the conversation untouched, they are never turned into
/// error turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum Rejection {
    /// The input is empty or whitespace only.
    #[error("input is empty")]
    EmptyInput,
    /// A reply is still being awaited.
    #[error("a reply is still being awaited")]
    AwaitingReply,
    /// The user has used up all of the turns.
    #[error("the limit of {0} user turns has been reached")]
    TurnLimitReached(usize),
}

/// Errors returned by reply transitions that are not valid in the
/// current stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum TransitionError {
    /// A reply was reported while no request was outstanding.
    #[error("no reply is being awaited")]
    NotAwaitingReply,
}

/// Represents a conversation.
#[derive(Clone, Debug)]
pub struct Conversation {
    turns: Vec<Turn>,
    stage: Stage,
    max_user_turns: usize,
    alert_acknowledged: bool,
    system_prompt: Option<String>,
    options: GenerationOptions,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_USER_TURNS)
    }
}

impl Conversation {
    /// Creates an empty conversation that accepts up to `max_user_turns`
    /// user turns.
    #[inline]
    pub fn new(max_user_turns: usize) -> Self {
        Self {
            turns: vec![],
            stage: Stage::Idle,
            max_user_turns,
            alert_acknowledged: false,
            system_prompt: None,
            options: GenerationOptions::default(),
        }
    }

    /// Sets the system instructions prepended to every request.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the generation options attached to every request.
    #[inline]
    pub fn with_generation_options(
        mut self,
        options: GenerationOptions,
    ) -> Self {
        self.options = options;
        self
    }

    /// Returns all turns in insertion order.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the current stage.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns `true` while a reply is being awaited.
    #[inline]
    pub fn is_awaiting_reply(&self) -> bool {
        self.stage == Stage::AwaitingReply
    }

    /// Returns the configured cap on user turns.
    #[inline]
    pub fn max_user_turns(&self) -> usize {
        self.max_user_turns
    }

    /// Returns the number of user turns so far.
    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }

    /// Returns how many more user turns will be accepted.
    #[inline]
    pub fn remaining_user_turns(&self) -> usize {
        self.max_user_turns.saturating_sub(self.user_turn_count())
    }

    /// Returns `true` if a non-empty submission would be accepted right
    /// now. Input affordances should be disabled otherwise.
    #[inline]
    pub fn accepts_input(&self) -> bool {
        self.stage == Stage::Idle && self.remaining_user_turns() > 0
    }

    /// Returns `true` once the user-turn limit has been reached and the
    /// alert has not been acknowledged yet.
    #[inline]
    pub fn turn_count_alert(&self) -> bool {
        self.remaining_user_turns() == 0 && !self.alert_acknowledged
    }

    /// Clears the turn-limit alert. The alert fires once per conversation,
    /// so it stays cleared.
    #[inline]
    pub fn acknowledge_alert(&mut self) {
        if self.remaining_user_turns() == 0 {
            self.alert_acknowledged = true;
        }
    }

    /// Submits a user input.
    ///
    /// On success the input is appended as a user turn, the conversation
    /// starts awaiting a reply, and the request carrying the whole history
    /// is returned. Otherwise nothing changes.
    pub fn submit(&mut self, text: &str) -> Result<ModelRequest, Rejection> {
        if text.trim().is_empty() {
            return Err(Rejection::EmptyInput);
        }
        if self.stage == Stage::AwaitingReply {
            return Err(Rejection::AwaitingReply);
        }
        if self.remaining_user_turns() == 0 {
            return Err(Rejection::TurnLimitReached(self.max_user_turns));
        }

        self.turns.push(Turn::new(Role::User, text));
        self.stage = Stage::AwaitingReply;
        Ok(self.build_model_request())
    }

    /// Records a successful reply.
    pub fn on_reply_success<S: Into<String>>(
        &mut self,
        text: S,
    ) -> Result<&Turn, TransitionError> {
        self.finish_reply(Turn::new(Role::Assistant, text))
    }

    /// Records a failed request as an error turn.
    pub fn on_reply_failure<S: Into<String>>(
        &mut self,
        message: S,
    ) -> Result<&Turn, TransitionError> {
        self.finish_reply(Turn::new(Role::Error, message))
    }

    fn finish_reply(&mut self, turn: Turn) -> Result<&Turn, TransitionError> {
        if self.stage != Stage::AwaitingReply {
            return Err(TransitionError::NotAwaitingReply);
        }
        self.stage = Stage::Idle;
        self.turns.push(turn);
        Ok(&self.turns[self.turns.len() - 1])
    }

    /// Error turns only exist for display, they are not sent back to the
    /// model.
    fn build_model_request(&self) -> ModelRequest {
        let history = self.turns.iter().filter_map(|turn| match turn.role {
            Role::User => Some(ModelMessage::User(turn.content.clone())),
            Role::Assistant => {
                Some(ModelMessage::Assistant(turn.content.clone()))
            }
            Role::Error => None,
        });
        ModelRequest {
            messages: self
                .system_prompt
                .iter()
                .map(|prompt| ModelMessage::System(prompt.clone()))
                .chain(history)
                .collect(),
            options: self.options,
        }
    }
}
