use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::loader::load_documents;
use crate::models::DocumentKind;
use crate::vector_index::VectorIndex;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Owns the per-type index directories and their `*_indexed.json` sidecars
/// under one root.
pub struct IndexManager<'a, E: Embedder + ?Sized> {
    index_root: PathBuf,
    embedder: &'a E,
    chunking: ChunkingConfig,
}

impl<'a, E: Embedder + ?Sized> IndexManager<'a, E> {
    pub fn new(index_root: impl Into<PathBuf>, embedder: &'a E, chunking: ChunkingConfig) -> Self {
        Self {
            index_root: index_root.into(),
            embedder,
            chunking,
        }
    }

    pub fn index_dir(&self, file_type: &str) -> PathBuf {
        self.index_root.join(format!("{file_type}_index"))
    }

    pub fn sidecar_path(&self, file_type: &str) -> PathBuf {
        self.index_root.join(format!("{file_type}_indexed.json"))
    }

    /// Brings the persisted index for `file_type` up to date with `paths`
    /// and returns it. Only files missing from the sidecar are parsed and
    /// embedded. `None` means the type has nothing searchable.
    pub fn build_or_load<P: AsRef<Path>>(
        &self,
        file_type: &str,
        paths: &[P],
    ) -> Result<Option<VectorIndex>, IndexError> {
        let index_dir = self.index_dir(file_type);
        let sidecar = self.sidecar_path(file_type);

        let indexed_files = read_indexed_files(&sidecar)?;
        let current_files = resolve_paths(paths)?;
        let new_files = current_files
            .difference(&indexed_files)
            .cloned()
            .collect::<BTreeSet<_>>();

        if new_files.is_empty() {
            // Deleted sources are dropped in memory only; disk stays as is.
            let mut index = VectorIndex::load_local(&index_dir)?;
            let persisted = index.len();
            index.retain_sources(|source| current_files.contains(source));
            info!(
                file_type,
                pruned = persisted - index.len(),
                "index is up to date"
            );
            return Ok(Some(index));
        }

        info!(file_type, new_files = new_files.len(), "indexing new files");

        let Some(kind) = DocumentKind::from_tag(file_type) else {
            warn!(file_type, files = new_files.len(), "no loader for file type");
            return Ok(None);
        };

        let existing = if VectorIndex::exists(&index_dir) {
            Some(VectorIndex::load_local(&index_dir)?)
        } else {
            None
        };

        let to_parse = if existing.is_none() && !indexed_files.is_empty() {
            warn!(
                file_type,
                index_dir = %index_dir.display(),
                "index directory missing, re-indexing every file"
            );
            current_files.clone()
        } else {
            new_files
        };

        let paths_to_parse = to_parse.iter().map(PathBuf::from).collect::<Vec<_>>();
        let report = load_documents(kind, paths_to_parse.as_slice(), self.chunking)?;
        if report.documents.is_empty() {
            warn!(file_type, "no documents produced, index left untouched");
            return Ok(existing);
        }

        let texts = report
            .documents
            .iter()
            .map(|document| document.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_documents(&texts)?;

        let index = match existing {
            Some(mut index) => {
                index.retain_sources(|source| {
                    current_files.contains(source) && !to_parse.contains(source)
                });
                index.add_documents(report.documents, embeddings)?;
                index
            }
            None => VectorIndex::from_documents(report.documents, embeddings)?,
        };

        index.save_local(&index_dir)?;
        write_indexed_files(&sidecar, &current_files)?;
        info!(file_type, entries = index.len(), "index saved");

        Ok(Some(index))
    }
}

/// Reads a sidecar. Missing or malformed files count as nothing indexed.
pub fn read_indexed_files(path: &Path) -> Result<BTreeSet<String>, IndexError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(error) => return Err(error.into()),
    };

    match serde_json::from_slice::<Vec<String>>(&bytes) {
        Ok(files) => Ok(files.into_iter().collect()),
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring malformed sidecar");
            Ok(BTreeSet::new())
        }
    }
}

pub fn write_indexed_files(path: &Path, files: &BTreeSet<String>) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let sorted = files.iter().collect::<Vec<_>>();
    fs::write(path, serde_json::to_string_pretty(&sorted)?)?;
    Ok(())
}

fn resolve_paths<P: AsRef<Path>>(paths: &[P]) -> Result<BTreeSet<String>, IndexError> {
    paths
        .iter()
        .map(|path| {
            let resolved = fs::canonicalize(path.as_ref())?;
            Ok::<_, IndexError>(resolved.to_string_lossy().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ProviderError;
    use crate::retriever::{retrieve_all_sources, Stores};
    use std::cell::Cell;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct CountingEmbedder {
        inner: CharacterNgramEmbedder,
        document_calls: Cell<usize>,
        embedded_texts: Cell<usize>,
    }

    impl Embedder for CountingEmbedder {
        fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.document_calls.set(self.document_calls.get() + 1);
            self.embedded_texts.set(self.embedded_texts.get() + texts.len());
            self.inner.embed_documents(texts)
        }

        fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.inner.embed_query(text)
        }
    }

    struct Workspace {
        _dir: TempDir,
        data: PathBuf,
        indexes: PathBuf,
    }

    fn workspace() -> Result<Workspace, Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let data = dir.path().join("data");
        let indexes = dir.path().join("indexes");
        fs::create_dir_all(&data)?;
        fs::create_dir_all(&indexes)?;
        Ok(Workspace {
            _dir: dir,
            data,
            indexes,
        })
    }

    fn sources(index: &VectorIndex) -> BTreeSet<String> {
        index
            .entries()
            .iter()
            .map(|entry| entry.document.metadata.source.clone())
            .collect()
    }

    #[test]
    fn first_pass_builds_index_and_full_sidecar() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        let b = ws.data.join("b.txt");
        fs::write(&a, "The sky is blue.")?;
        fs::write(&b, "Grass is green.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        let index = manager.build_or_load("txt", &[&b, &a])?;

        assert_eq!(index.map(|index| index.len()), Some(2));
        assert!(manager.index_dir("txt").join("index.json").is_file());

        let mut expected = vec![
            fs::canonicalize(&a)?.to_string_lossy().to_string(),
            fs::canonicalize(&b)?.to_string_lossy().to_string(),
        ];
        expected.sort();
        let written: Vec<String> =
            serde_json::from_str(&fs::read_to_string(manager.sidecar_path("txt"))?)?;
        assert_eq!(written, expected);
        Ok(())
    }

    #[test]
    fn second_pass_without_changes_reuses_index() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        fs::write(&a, "The sky is blue.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a])?;

        let sidecar_before = fs::read(manager.sidecar_path("txt"))?;
        let index_before = fs::read(manager.index_dir("txt").join("index.json"))?;

        let index = manager.build_or_load("txt", &[&a])?;

        assert_eq!(embedder.document_calls.get(), 1);
        assert_eq!(index.map(|index| index.len()), Some(1));
        assert_eq!(fs::read(manager.sidecar_path("txt"))?, sidecar_before);
        assert_eq!(fs::read(manager.index_dir("txt").join("index.json"))?, index_before);
        Ok(())
    }

    #[test]
    fn new_file_is_merged_into_existing_index() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        let b = ws.data.join("b.txt");
        fs::write(&a, "The sky is blue.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a])?;

        fs::write(&b, "Grass is green.")?;
        let index = manager
            .build_or_load("txt", &[&a, &b])?
            .ok_or("index expected")?;

        assert_eq!(index.len(), 2);
        assert_eq!(embedder.embedded_texts.get(), 2);
        assert_eq!(
            sources(&index),
            read_indexed_files(&manager.sidecar_path("txt"))?
        );
        Ok(())
    }

    #[test]
    fn removed_files_are_pruned_on_next_rebuild() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        let b = ws.data.join("b.txt");
        let c = ws.data.join("c.txt");
        fs::write(&a, "The sky is blue.")?;
        fs::write(&b, "Grass is green.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a, &b])?;

        let removed = fs::canonicalize(&b)?.to_string_lossy().to_string();
        fs::remove_file(&b)?;
        fs::write(&c, "Snow is white.")?;
        let index = manager
            .build_or_load("txt", &[&a, &c])?
            .ok_or("index expected")?;

        assert_eq!(index.len(), 2);
        assert!(!sources(&index).contains(&removed));
        Ok(())
    }

    #[test]
    fn deleted_file_is_not_served_when_nothing_is_new() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        let b = ws.data.join("b.txt");
        fs::write(&a, "The sky is blue.")?;
        fs::write(&b, "The secret password is hunter2.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a, &b])?;

        let removed = fs::canonicalize(&b)?.to_string_lossy().to_string();
        let sidecar_before = fs::read(manager.sidecar_path("txt"))?;
        let index_before = fs::read(manager.index_dir("txt").join("index.json"))?;
        fs::remove_file(&b)?;

        let index = manager
            .build_or_load("txt", &[&a])?
            .ok_or("index expected")?;
        let mut stores = Stores::new();
        stores.insert("txt".to_string(), Some(index));
        let hits = retrieve_all_sources("secret password", &stores, &embedder, 2)?;

        assert_eq!(hits.len(), 1);
        assert!(hits
            .iter()
            .all(|hit| hit.document.metadata.source != removed));
        assert_eq!(embedder.document_calls.get(), 1);
        assert_eq!(fs::read(manager.sidecar_path("txt"))?, sidecar_before);
        assert_eq!(fs::read(manager.index_dir("txt").join("index.json"))?, index_before);
        Ok(())
    }

    #[test]
    fn full_reindex_adopts_new_embedding_dimensions() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        fs::write(&a, "The sky is blue.")?;

        let wide = CharacterNgramEmbedder { dimensions: 128 };
        IndexManager::new(&ws.indexes, &wide, ChunkingConfig::default()).build_or_load("txt", &[&a])?;

        let narrow = CharacterNgramEmbedder { dimensions: 64 };
        let manager = IndexManager::new(&ws.indexes, &narrow, ChunkingConfig::default());
        fs::write(manager.sidecar_path("txt"), "{not json")?;

        let index = manager
            .build_or_load("txt", &[&a])?
            .ok_or("index expected")?;

        assert_eq!(index.len(), 1);
        assert_eq!(index.dimensions(), 64);
        assert_eq!(VectorIndex::load_local(&manager.index_dir("txt"))?.dimensions(), 64);
        Ok(())
    }

    #[test]
    fn unsupported_type_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let csv = ws.data.join("table.csv");
        fs::write(&csv, "a,b\n1,2\n")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());

        assert!(manager.build_or_load("csv", &[&csv])?.is_none());
        assert!(!manager.index_dir("csv").exists());
        assert!(!manager.sidecar_path("csv").exists());
        assert_eq!(embedder.document_calls.get(), 0);
        Ok(())
    }

    #[test]
    fn type_without_parseable_documents_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let broken = ws.data.join("broken.pdf");
        fs::write(&broken, b"%PDF-1.4\n%broken")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());

        assert!(manager.build_or_load("pdf", &[&broken])?.is_none());
        assert!(!manager.index_dir("pdf").exists());
        assert!(!manager.sidecar_path("pdf").exists());
        Ok(())
    }

    #[test]
    fn malformed_sidecar_is_treated_as_empty() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        fs::write(&a, "The sky is blue.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a])?;
        fs::write(manager.sidecar_path("txt"), "{not json")?;

        let index = manager
            .build_or_load("txt", &[&a])?
            .ok_or("index expected")?;

        assert_eq!(index.len(), 1);
        assert_eq!(embedder.document_calls.get(), 2);
        assert_eq!(read_indexed_files(&manager.sidecar_path("txt"))?.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_index_with_current_sidecar_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        fs::write(&a, "The sky is blue.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a])?;
        fs::remove_dir_all(manager.index_dir("txt"))?;

        assert!(matches!(
            manager.build_or_load("txt", &[&a]),
            Err(IndexError::MissingIndex(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_index_with_new_files_reindexes_everything() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        let a = ws.data.join("a.txt");
        let b = ws.data.join("b.txt");
        fs::write(&a, "The sky is blue.")?;

        let embedder = CountingEmbedder::default();
        let manager = IndexManager::new(&ws.indexes, &embedder, ChunkingConfig::default());
        manager.build_or_load("txt", &[&a])?;
        fs::remove_dir_all(manager.index_dir("txt"))?;
        fs::write(&b, "Grass is green.")?;

        let index = manager
            .build_or_load("txt", &[&a, &b])?
            .ok_or("index expected")?;
        assert_eq!(index.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_sidecar_reads_as_empty() -> Result<(), Box<dyn std::error::Error>> {
        let ws = workspace()?;
        assert!(read_indexed_files(&ws.indexes.join("pdf_indexed.json"))?.is_empty());
        Ok(())
    }
}
