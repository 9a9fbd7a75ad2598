use serde::{Deserialize, Serialize};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request never reached the provider, or the connection broke
    /// while reading the response.
    Network,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The prompt or the reply is moderated.
    Moderated,
    /// The provider answered with an error status or a body that cannot
    /// be understood.
    Provider,
}

impl ErrorKind {
    /// Returns `true` if retrying the same request may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::RateLimitExceeded)
    }
}
