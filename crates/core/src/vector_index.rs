use crate::embeddings::cosine_similarity;
use crate::error::IndexError;
use crate::models::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// File-backed flat vector index searched by cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: usize,
    updated_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn from_documents(
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        let mut index = Self {
            dimensions,
            updated_at: Utc::now(),
            entries: Vec::new(),
        };
        index.add_documents(documents, embeddings)?;
        Ok(index)
    }

    pub fn add_documents(
        &mut self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        if documents.len() != embeddings.len() {
            return Err(IndexError::EmbeddingCount {
                documents: documents.len(),
                embeddings: embeddings.len(),
            });
        }

        if self.entries.is_empty() {
            self.dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        }

        if let Some(vector) = embeddings.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        self.entries.extend(
            documents
                .into_iter()
                .zip(embeddings)
                .map(|(document, vector)| IndexEntry { document, vector }),
        );
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Keeps only entries whose source path satisfies `keep`.
    pub fn retain_sources(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries
            .retain(|entry| keep(&entry.document.metadata.source));
    }

    /// Top `k` entries by cosine similarity, best first. Ties keep insertion
    /// order.
    pub fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(&Document, f32)>, IndexError> {
        if !self.entries.is_empty() && query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored = self
            .entries
            .iter()
            .map(|entry| (&entry.document, cosine_similarity(query_vector, &entry.vector)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn save_local(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir)?;
        fs::write(Self::index_file(dir), serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn load_local(dir: &Path) -> Result<Self, IndexError> {
        let path = Self::index_file(dir);
        if !path.is_file() {
            return Err(IndexError::MissingIndex(dir.to_path_buf()));
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::index_file(dir).is_file()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    fn index_file(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }
}
