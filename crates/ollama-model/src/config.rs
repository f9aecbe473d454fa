use std::env;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Builder for [`OllamaConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct OllamaConfigBuilder {
    base_url: Option<String>,
}

impl OllamaConfigBuilder {
    /// Creates an empty builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom base URL.
    ///
    /// A missing scheme is tolerated and defaults to `http://`, so both
    /// `my-host:11434` and `http://my-host:11434` work.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(normalize_base_url(base_url.into()));
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OllamaConfig {
        OllamaConfig {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

/// Configuration for the Ollama provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OllamaConfig {
    base_url: String,
}

impl OllamaConfig {
    /// Builds a configuration from the `OLLAMA_HOST` environment
    /// variable, falling back to `http://localhost:11434`.
    pub fn from_env() -> Self {
        let mut builder = OllamaConfigBuilder::new();
        if let Ok(host) = env::var("OLLAMA_HOST") {
            if !host.is_empty() {
                builder = builder.with_base_url(host);
            }
        }
        builder.build()
    }

    /// The base URL requests are sent to, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        OllamaConfigBuilder::new().build()
    }
}

fn normalize_base_url(mut base_url: String) -> String {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        base_url = format!("http://{base_url}");
    }
    while base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        let config = OllamaConfigBuilder::new().build();
        assert_eq!(config.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_scheme_prefixing() {
        let config = OllamaConfigBuilder::new()
            .with_base_url("studio.local:11434")
            .build();
        assert_eq!(config.base_url(), "http://studio.local:11434");

        let config = OllamaConfigBuilder::new()
            .with_base_url("https://ollama.example.com/")
            .build();
        assert_eq!(config.base_url(), "https://ollama.example.com");
    }
}
