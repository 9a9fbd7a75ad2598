//! An abstraction layer for the completion providers a chat can talk to.
//!
//! This crate establishes an unified protocol for the chat core to
//! interact with various generative-language APIs, so that the provider
//! can be swapped by configuration without touching the conversation
//! logic.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
