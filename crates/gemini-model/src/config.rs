use std::fmt::Debug;
use std::time::Duration;

/// Builder for [`GeminiConfig`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct GeminiConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    retry_timeout: Option<Duration>,
}

impl GeminiConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Creates a builder without an API key, for endpoints behind a proxy
    /// that adds the credentials itself.
    #[inline]
    pub fn without_api_key() -> Self {
        Self::default()
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Retries transient failures with exponential backoff until the given
    /// time has elapsed. Requests are not retried by default.
    #[inline]
    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> GeminiConfig {
        let base_url = self.base_url.unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });
        GeminiConfig {
            api_key: self.api_key,
            model: self
                .model
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            retry_timeout: self.retry_timeout,
        }
    }
}

impl Debug for GeminiConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("retry_timeout", &self.retry_timeout)
            .finish()
    }
}

/// Configuration for the Gemini provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GeminiConfig {
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) retry_timeout: Option<Duration>,
}

impl GeminiConfig {
    #[inline]
    pub(crate) fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("retry_timeout", &self.retry_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url() {
        let config = GeminiConfigBuilder::without_api_key()
            .with_base_url("https://proxy.example.com/gemini/")
            .build();
        assert_eq!(
            config.generate_url(),
            "https://proxy.example.com/gemini/models/\
             gemini-2.0-flash:generateContent"
        );
        let config = GeminiConfigBuilder::with_api_key("AIza-secret").build();
        assert!(!format!("{config:?}").contains("AIza-secret"));
    }
}
