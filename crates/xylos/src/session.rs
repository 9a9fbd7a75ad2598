#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use xylos_core::conversation::{Conversation, Rejection, Role, Turn};
use xylos_core::format::{FormatOptions, Formatter};
use xylos_core::{Chat, ChatBuilder};
use xylos_model::ModelProvider;

use crate::store::{MemoryStore, Store};
use crate::theme::Theme;

/// Store key of the submitted user turns.
pub(crate) const HISTORY_KEY: &str = "chatHistory";
/// Store key of the colour theme.
pub(crate) const THEME_KEY: &str = "theme";

type TurnCallback = Box<dyn Fn(&Turn) + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    chat_builder: ChatBuilder,
    store: Option<Box<dyn Store>>,
    format_options: FormatOptions,
    on_turn: Option<TurnCallback>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        Self {
            chat_builder: ChatBuilder::with_model_provider(provider),
            store: None,
            format_options: FormatOptions::default(),
            on_turn: None,
        }
    }

    /// Sets the system prompt sent ahead of the conversation.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.chat_builder = self.chat_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the cap on user turns.
    #[inline]
    pub fn with_max_user_turns(mut self, max_user_turns: usize) -> Self {
        self.chat_builder =
            self.chat_builder.with_max_user_turns(max_user_turns);
        self
    }

    /// Sets the cap on the reply length.
    #[inline]
    pub fn with_max_output_tokens(
        mut self,
        max_output_tokens: Option<u32>,
    ) -> Self {
        self.chat_builder =
            self.chat_builder.with_max_output_tokens(max_output_tokens);
        self
    }

    /// Uses a fixed text for error turns.
    #[inline]
    pub fn with_failure_message<S: Into<String>>(mut self, message: S) -> Self {
        self.chat_builder = self.chat_builder.with_failure_message(message);
        self
    }

    /// Waits for the given duration before each request is sent.
    #[inline]
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.chat_builder = self.chat_builder.with_reply_delay(delay);
        self
    }

    /// Sets the store holding the history and the theme. Without one, the
    /// session keeps them in memory.
    #[inline]
    pub fn with_store<S: Store + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Sets the options of the formatter used by [`Session::render`].
    #[inline]
    pub fn with_format_options(mut self, options: FormatOptions) -> Self {
        self.format_options = options;
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
        self.chat_builder = self.chat_builder.on_typing(on_typing);
        self
    }

    /// Builds a new session, restoring the history and the theme from the
    /// store.
    pub fn build(self) -> Session {
        let store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryStore::new()));
        let state = SessionState {
            history: load_history(&*store),
            theme: load_theme(&*store),
        };
        debug!(
            history = state.history.len(),
            theme = %state.theme,
            "restored session state"
        );
        let persisted = Arc::new(Persisted {
            store,
            state: Mutex::new(state),
        });

        let on_turn = self.on_turn;
        let chat = self
            .chat_builder
            .on_turn({
                let persisted = Arc::clone(&persisted);
                move |turn| {
                    if turn.role() == Role::User {
                        persisted.record_history(turn);
                    }
                    if let Some(on_turn) = &on_turn {
                        on_turn(turn);
                    }
                }
            })
            .build();

        Session {
            chat,
            persisted,
            formatter: Formatter::new(self.format_options),
        }
    }
}

/// A formatted turn, ready to be put on the display surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedTurn {
    /// The role of the turn.
    pub role: Role,
    /// The HTML fragment of the turn content.
    pub html: String,
}

/// A chat session, like a window that displays messages and has an input
/// box, a history sidebar and a theme switch.
///
/// The session holds a fully configured [`Chat`] and persists what the
/// user submits and the chosen theme. Store failures are logged and never
/// interrupt the session.
pub struct Session {
    chat: Chat,
    persisted: Arc<Persisted>,
    formatter: Formatter,
}

impl Session {
    /// Sends a message to the session and waits for the reply.
    ///
    /// See [`Chat::submit`].
    #[inline]
    pub async fn send_message(
        &self,
        message: &str,
    ) -> Result<Turn, Rejection> {
        self.chat.submit(message).await
    }

    /// Returns the underlying chat.
    #[inline]
    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    /// Returns a snapshot of the live conversation.
    #[inline]
    pub fn conversation(&self) -> Conversation {
        self.chat.conversation()
    }

    /// Returns the formatted turns of the live conversation.
    pub fn render(&self) -> Vec<RenderedTurn> {
        self.conversation()
            .turns()
            .iter()
            .map(|turn| RenderedTurn {
                role: turn.role(),
                html: self.formatter.format(turn.content()),
            })
            .collect()
    }

    /// Returns every user turn submitted so far, including those of
    /// earlier sessions sharing the store.
    pub fn history(&self) -> Vec<Turn> {
        self.persisted.lock().history.clone()
    }

    /// Returns the current theme.
    pub fn theme(&self) -> Theme {
        self.persisted.lock().theme
    }

    /// Sets the theme.
    pub fn set_theme(&self, theme: Theme) {
        self.persisted.set_theme(theme);
    }

    /// Switches between the light and the dark theme, returning the new
    /// one.
    pub fn toggle_theme(&self) -> Theme {
        let theme = self.theme().toggled();
        self.persisted.set_theme(theme);
        theme
    }

    /// Returns `true` while a reply is being awaited.
    #[inline]
    pub fn is_typing(&self) -> bool {
        self.chat.is_typing()
    }

    /// Returns `true` if a non-empty message would be accepted right now.
    #[inline]
    pub fn accepts_input(&self) -> bool {
        self.chat.accepts_input()
    }

    /// Returns `true` if the turn-limit alert is raised.
    #[inline]
    pub fn turn_limit_alert(&self) -> bool {
        self.chat.turn_count_alert()
    }

    /// Clears the turn-limit alert.
    #[inline]
    pub fn acknowledge_alert(&self) {
        self.chat.acknowledge_alert();
    }
}

struct SessionState {
    history: Vec<Turn>,
    theme: Theme,
}

struct Persisted {
    store: Box<dyn Store>,
    state: Mutex<SessionState>,
}

impl Persisted {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_history(&self, turn: &Turn) {
        // The store is written under the lock so that concurrent writers
        // cannot reorder snapshots.
        let mut state = self.lock();
        state.history.push(turn.clone());
        match serde_json::to_string(&state.history) {
            Ok(json) => self.save(HISTORY_KEY, &json),
            Err(err) => warn!("failed to serialize the history: {err}"),
        }
    }

    fn set_theme(&self, theme: Theme) {
        let mut state = self.lock();
        state.theme = theme;
        self.save(THEME_KEY, theme.as_str());
    }

    fn save(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            warn!("failed to persist `{key}`: {err}");
        }
    }
}

fn load_history(store: &dyn Store) -> Vec<Turn> {
    match store.get(HISTORY_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
            warn!("ignoring malformed history: {err}");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!("failed to load the history: {err}");
            Vec::new()
        }
    }
}

fn load_theme(store: &dyn Store) -> Theme {
    match store.get(THEME_KEY) {
        Ok(Some(name)) => name.parse().unwrap_or_else(|err| {
            warn!("ignoring stored theme: {err}");
            Theme::default()
        }),
        Ok(None) => Theme::default(),
        Err(err) => {
            warn!("failed to load the theme: {err}");
            Theme::default()
        }
    }
}
