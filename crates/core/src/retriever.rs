use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::models::RetrievedChunk;
use crate::vector_index::VectorIndex;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 2;

/// Per-type stores; `None` marks a type with nothing searchable.
pub type Stores = BTreeMap<String, Option<VectorIndex>>;

/// Runs `query` against every available store and concatenates the top `k`
/// hits of each, in store order.
pub fn retrieve_all_sources<E: Embedder + ?Sized>(
    query: &str,
    stores: &Stores,
    embedder: &E,
    k: usize,
) -> Result<Vec<RetrievedChunk>, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let available = stores
        .iter()
        .filter_map(|(file_type, store)| match store {
            Some(store) => Some((file_type, store)),
            None => {
                debug!(file_type = %file_type, "skipping type without index");
                None
            }
        })
        .collect::<Vec<_>>();

    if available.is_empty() {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed_query(query)?;
    let mut retrieved = Vec::new();

    for (file_type, store) in available {
        for (document, score) in store.similarity_search(&query_vector, k)? {
            retrieved.push(RetrievedChunk {
                file_type: file_type.clone(),
                score,
                document: document.clone(),
            });
        }
    }

    Ok(retrieved)
}

pub fn context_text(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.document.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
