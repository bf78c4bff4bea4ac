use crate::answer::AnswerGenerator;
use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::index_manager::IndexManager;
use crate::models::{Answer, PipelineOptions, RetrievedChunk};
use crate::retriever::{retrieve_all_sources, Stores};
use crate::scanner::scan_directory;
use crate::traits::ChatModel;
use std::fs;
use tracing::info;

/// Scan, index, retrieve and answer over one data directory.
pub struct Pipeline<E, M>
where
    E: Embedder,
    M: ChatModel,
{
    options: PipelineOptions,
    embedder: E,
    generator: AnswerGenerator<M>,
}

impl<E, M> Pipeline<E, M>
where
    E: Embedder,
    M: ChatModel,
{
    pub fn new(options: PipelineOptions, embedder: E, model: M) -> Self {
        Self {
            options,
            embedder,
            generator: AnswerGenerator::new(model),
        }
    }

    /// Builds or loads the index of every file type found in the data
    /// directory.
    pub fn index_all(&self) -> Result<Stores, PipelineError> {
        fs::create_dir_all(&self.options.index_dir)?;

        let groups = scan_directory(&self.options.data_dir);
        let manager = IndexManager::new(
            &self.options.index_dir,
            &self.embedder,
            ChunkingConfig::from(&self.options),
        );

        let mut stores = Stores::new();
        for (file_type, paths) in &groups {
            let store = manager.build_or_load(file_type, paths.as_slice())?;
            stores.insert(file_type.clone(), store);
        }

        Ok(stores)
    }

    pub fn retrieve(&self, question: &str, stores: &Stores) -> Result<Vec<RetrievedChunk>, PipelineError> {
        Ok(retrieve_all_sources(
            question,
            stores,
            &self.embedder,
            self.options.top_k,
        )?)
    }

    /// Answers `question` from the indexed documents. `None` when there is
    /// nothing to search.
    pub fn ask(&self, question: &str) -> Result<Option<Answer>, PipelineError> {
        let stores = self.index_all()?;
        if stores.values().all(Option::is_none) {
            info!(data_dir = %self.options.data_dir.display(), "no searchable documents");
            return Ok(None);
        }

        let context = self.retrieve(question, &stores)?;
        info!(chunks = context.len(), "retrieved context");

        let text = self.generator.answer(question, &context)?;
        Ok(Some(Answer { text, context }))
    }
}
