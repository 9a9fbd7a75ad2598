mod builder;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use xylos_model::ModelProviderError;

use crate::conversation::{Conversation, Rejection, Role, Turn};
use crate::model_client::ModelClient;
pub use builder::ChatBuilder;

type TurnCallback = Box<dyn Fn(&Turn) + Send + Sync>;
type TypingCallback = Box<dyn Fn(bool) + Send + Sync>;

/// A chat, which connects a [`Conversation`] to a model provider.
///
/// `Chat` is a cheap handle, clones share the same conversation. Only one
/// request can be outstanding at a time: submissions made while a reply is
/// being awaited are rejected, no matter which clone they come from.
///
/// Provider failures never escape the chat. They are recorded as error
/// turns and the chat goes back to accepting input.
///
/// Callbacks are invoked in conversation order, even when clones submit
/// from different threads. They must not wait on a submission of the same
/// chat.
#[derive(Clone)]
pub struct Chat {
    inner: Arc<ChatInner>,
}

struct ChatInner {
    model_client: ModelClient,
    conversation: Mutex<Conversation>,
    // Taken before `conversation` and held until the callbacks of a
    // transition have returned.
    notify_order: Mutex<()>,
    failure_message: Option<String>,
    reply_delay: Option<Duration>,
    on_turn: Option<TurnCallback>,
    on_typing: Option<TypingCallback>,
}

impl Chat {
    fn from_builder(mut builder: ChatBuilder) -> Self {
        let conversation = builder.make_conversation();
        let ChatBuilder {
            model_client,
            failure_message,
            reply_delay,
            on_turn,
            on_typing,
            ..
        } = builder;
        let inner = ChatInner {
            model_client,
            conversation: Mutex::new(conversation),
            notify_order: Mutex::new(()),
            failure_message,
            reply_delay,
            on_turn,
            on_typing,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Submits a user input and waits for the reply.
    ///
    /// Returns the turn appended for the reply, which is an error turn if
    /// the provider failed. Rejected inputs leave the conversation
    /// unchanged.
    ///
    /// # Cancel safety
    ///
    /// Dropping the returned future while the reply is being awaited
    /// records an error turn, so the chat accepts input again.
    pub async fn submit(&self, text: &str) -> Result<Turn, Rejection> {
        let request = {
            let _order = self.inner.lock_notify_order();
            let (request, user_turn) = {
                let mut conversation = self.inner.lock();
                let request =
                    conversation.submit(text).inspect_err(|reason| {
                        debug!("input rejected: {reason}");
                    })?;
                (request, conversation.turns().last().cloned())
            };
            if let Some(turn) = &user_turn {
                self.inner.notify_turn(turn);
            }
            self.inner.notify_typing(true);
            request
        };

        let mut pending = PendingReply {
            inner: &*self.inner,
            finished: false,
        };

        if let Some(delay) = self.inner.reply_delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.inner.model_client.send_request(request).await;

        let turn = match outcome {
            Ok(reply) => pending.finish(Ok(reply.text)),
            Err(err) => {
                warn!("provider failed ({:?}): {err}", err.kind());
                let message = self.inner.failure_text(err.as_ref());
                pending.finish(Err(message))
            }
        };
        Ok(turn)
    }

    /// Returns a snapshot of the conversation.
    pub fn conversation(&self) -> Conversation {
        self.inner.lock().clone()
    }

    /// Returns `true` while a reply is being awaited.
    pub fn is_typing(&self) -> bool {
        self.inner.lock().is_awaiting_reply()
    }

    /// Returns `true` if a non-empty input would be accepted right now.
    pub fn accepts_input(&self) -> bool {
        self.inner.lock().accepts_input()
    }

    /// Returns `true` if the turn-limit alert is raised.
    pub fn turn_count_alert(&self) -> bool {
        self.inner.lock().turn_count_alert()
    }

    /// Clears the turn-limit alert.
    pub fn acknowledge_alert(&self) {
        self.inner.lock().acknowledge_alert();
    }
}

impl ChatInner {
    #[inline]
    fn lock_notify_order(&self) -> MutexGuard<'_, ()> {
        self.notify_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Conversation> {
        // Callbacks run outside of the lock, so a poisoned lock still holds
        // a consistent conversation.
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn failure_text(&self, err: &dyn ModelProviderError) -> String {
        match &self.failure_message {
            Some(message) => message.clone(),
            None => err.to_string(),
        }
    }

    #[inline]
    fn notify_turn(&self, turn: &Turn) {
        if let Some(on_turn) = &self.on_turn {
            on_turn(turn);
        }
    }

    #[inline]
    fn notify_typing(&self, typing: bool) {
        if let Some(on_typing) = &self.on_typing {
            on_typing(typing);
        }
    }
}

/// Tracks the outstanding reply of a submission, so that the conversation
/// never gets stuck awaiting a reply that nobody will deliver.
struct PendingReply<'a> {
    inner: &'a ChatInner,
    finished: bool,
}

impl PendingReply<'_> {
    fn finish(&mut self, outcome: Result<String, String>) -> Turn {
        self.finished = true;
        let _order = self.inner.lock_notify_order();
        let recorded = {
            let mut conversation = self.inner.lock();
            let recorded = match &outcome {
                Ok(text) => conversation.on_reply_success(text.as_str()),
                Err(message) => conversation.on_reply_failure(message.as_str()),
            };
            recorded.cloned()
        };
        self.inner.notify_typing(false);
        match recorded {
            Ok(turn) => {
                self.inner.notify_turn(&turn);
                turn
            }
            Err(err) => {
                error!("reply could not be recorded: {err}");
                match outcome {
                    Ok(text) => Turn::new(Role::Assistant, text),
                    Err(message) => Turn::new(Role::Error, message),
                }
            }
        }
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("submission dropped while awaiting the reply");
        self.finish(Err("The request was cancelled.".to_owned()));
    }
}
