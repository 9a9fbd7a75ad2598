//! Core logic of the chat: the conversation state machine, message
//! formatting, and the driver that connects a conversation to a model
//! provider.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod chat;
pub mod conversation;
pub mod format;
mod model_client;

pub use chat::{Chat, ChatBuilder};
