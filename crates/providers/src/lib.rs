//! Provider abstractions for the LLM fallback classifier.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod noop;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A model that judges a raw URL string, without access to extracted features.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns `true` when the model believes the URL is a phishing site.
    async fn classify_url(&self, url: &str) -> Result<bool, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopProvider;

    #[test]
    fn registry_without_preference_reports_unconfigured() {
        let reg = ProviderRegistry::new().with_llm("noop", Arc::new(NoopProvider));
        let err = reg.llm(None).err().unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider(_)));
        assert!(reg.llm(Some("noop")).is_ok());
    }

    #[test]
    fn registry_rejects_unknown_preferred_name() {
        let reg = ProviderRegistry::new()
            .with_llm("noop", Arc::new(NoopProvider))
            .set_preferred_llm("openai");
        match reg.llm(None) {
            Err(ProviderError::UnknownProvider(name)) => assert_eq!(name, "openai"),
            _ => panic!("expected unknown provider"),
        }
    }
}
