use crate::error::ProviderError;

/// A hosted text-generation model.
pub trait ChatModel {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

impl<M: ChatModel + ?Sized> ChatModel for &M {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        (**self).complete(prompt)
    }
}
