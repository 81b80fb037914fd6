use std::fmt::Debug;

/// Builder for [`BackendConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BackendConfigBuilder {
    token: String,
    base_url: Option<String>,
}

impl BackendConfigBuilder {
    /// Creates a builder with the given bearer credential.
    #[inline]
    pub fn with_token<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
            base_url: None,
        }
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> BackendConfig {
        BackendConfig {
            token: self.token,
            base_url: self
                .base_url
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
        }
    }
}

impl Debug for BackendConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfigBuilder")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for the HTTP backend.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    pub(crate) token: String,
    pub(crate) base_url: String,
}

impl Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
