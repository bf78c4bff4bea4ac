use crate::error::ProviderError;

/// Turns text into vectors. Documents and queries are separate calls so
/// providers can apply task-specific models.
pub trait Embedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        (**self).embed_documents(texts)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        (**self).embed_query(text)
    }
}

#[cfg(test)]
pub use offline::CharacterNgramEmbedder;


pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}
