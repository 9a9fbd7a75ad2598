//! An out-of-the-box chat session that assembles the conversation core, the
//! message formatter and a persistent store.
//!
//! The crate includes a CLI tool for chatting in the terminal. And you can
//! also use it as a library to bring the chat into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
mod store;
mod theme;

pub use session::{RenderedTurn, Session, SessionBuilder};
pub use store::{FileStore, MemoryStore, Store, StoreError};
pub use theme::{ParseThemeError, Theme};

/// Re-exports of [`xylos_core`] crate.
pub mod core {
    pub use xylos_core::*;
}

/// Re-exports of the bundled model providers.
pub mod providers {
    pub use xylos_gemini_model::{
        GeminiConfig, GeminiConfigBuilder, GeminiProvider,
    };
    pub use xylos_openai_model::{
        OpenAIConfig, OpenAIConfigBuilder, OpenAIProvider,
    };
}
