use crate::chunking::{build_documents, ChunkingConfig};
use crate::error::IngestError;
use crate::models::{Document, DocumentKind};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Parses every file with the format-specific parser for `kind` and
/// flattens the chunks in input order. A file that fails to parse is
/// reported in `skipped_files` and does not stop the batch.
pub fn load_documents<P: AsRef<Path>>(
    kind: DocumentKind,
    paths: &[P],
    config: ChunkingConfig,
) -> Result<LoadReport, IngestError> {
    config.validate()?;

    let mut report = LoadReport::default();

    for path in paths {
        let path = path.as_ref();
        match load_file(kind, path, config) {
            Ok(documents) => report.documents.extend(documents),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped unreadable file");
                report.skipped_files.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn load_file(
    kind: DocumentKind,
    path: &Path,
    config: ChunkingConfig,
) -> Result<Vec<Document>, IngestError> {
    let source = path.to_string_lossy().to_string();
    let mut documents = Vec::new();
    let mut cursor = 0u64;

    for page in kind.parse(path)? {
        let (page_documents, next_cursor) =
            build_documents(&source, kind, page.number, &page.text, config, cursor)?;
        cursor = next_cursor;
        documents.extend(page_documents);
    }

    Ok(documents)
}
