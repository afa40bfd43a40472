use crate::{LlmProvider, ProviderError};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl LlmProvider for NoopProvider {
    async fn classify_url(&self, _url: &str) -> Result<bool, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
