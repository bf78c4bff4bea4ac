use crate::error::ProviderError;
use crate::models::RetrievedChunk;
use crate::retriever::context_text;
use crate::traits::ChatModel;

pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Answer the following based on the context:\n{context}\n\nQuestion: {question}")
}

pub struct AnswerGenerator<M: ChatModel> {
    model: M,
}

impl<M: ChatModel> AnswerGenerator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Returns the model's raw answer for `question` grounded on `context`.
    pub fn answer(&self, question: &str, context: &[RetrievedChunk]) -> Result<String, ProviderError> {
        let prompt = build_prompt(&context_text(context), question);
        self.model.complete(&prompt)
    }
}
