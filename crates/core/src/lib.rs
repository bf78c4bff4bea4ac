pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod index_manager;
pub mod loader;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod scanner;
pub mod traits;
pub mod upload;
pub mod vector_index;

pub use answer::{build_prompt, AnswerGenerator};
pub use chunking::{build_documents, chunk_by_paragraph, normalize_whitespace, ChunkingConfig};
pub use embeddings::{cosine_similarity, Embedder};
pub use error::{IndexError, IngestError, PipelineError, ProviderError, SearchError};
pub use extractor::{extract_plaintext_from_docx_xml, DocumentParser, PageText};
pub use gemini::{GeminiClient, GeminiConfig};
pub use index_manager::{read_indexed_files, write_indexed_files, IndexManager};
pub use loader::{load_documents, LoadReport, SkippedFile};
pub use models::{
    Answer, Document, DocumentKind, DocumentMetadata, FileGroups, PipelineOptions, RetrievedChunk,
};
pub use orchestrator::Pipeline;
pub use retriever::{context_text, retrieve_all_sources, Stores, DEFAULT_TOP_K};
pub use scanner::scan_directory;
pub use traits::ChatModel;
pub use upload::{add_files, digest_file, AddedFile};
pub use vector_index::{IndexEntry, VectorIndex};
