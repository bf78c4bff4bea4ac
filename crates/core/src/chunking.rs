use crate::error::IngestError;
use crate::models::{Document, DocumentKind, DocumentMetadata, PipelineOptions};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&PipelineOptions::default())
    }
}

impl From<&PipelineOptions> for ChunkingConfig {
    fn from(value: &PipelineOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
            min_chars: value.min_chunk_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Packs blank-line separated paragraphs into chunks of at most `max_chars`
/// characters. Short chunks are carried forward instead of dropped, so any
/// non-blank input yields at least one chunk.
pub fn chunk_by_paragraph(text: &str, config: ChunkingConfig) -> Vec<String> {
    let paragraphs = text
        .replace("\r\n", "\n")
        .split("\n\n")
        .map(normalize_whitespace)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>();

    let mut packed = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if current.is_empty() {
            current = paragraph;
            continue;
        }

        let fits = char_len(&current) + char_len(&paragraph) + 1 <= config.max_chars;
        if fits || char_len(&current) < config.min_chars {
            current.push('\n');
            current.push_str(&paragraph);
        } else {
            packed.push(std::mem::replace(&mut current, paragraph));
        }
    }

    if !current.is_empty() {
        packed.push(current);
    }

    let mut windows = Vec::new();
    for chunk in packed {
        if char_len(&chunk) <= config.max_chars {
            windows.push(chunk);
            continue;
        }

        let chars: Vec<char> = chunk.chars().collect();
        let step = config.max_chars.saturating_sub(config.overlap_chars).max(1);
        let mut start = 0;
        while start < chars.len() {
            let end = (start + config.max_chars).min(chars.len());
            windows.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }

    windows
}

/// Turns one parsed section of a file into documents, continuing the
/// per-file chunk counter from `first_index`. Returns the next free index.
pub fn build_documents(
    source: &str,
    kind: DocumentKind,
    page: Option<u32>,
    section_text: &str,
    config: ChunkingConfig,
    first_index: u64,
) -> Result<(Vec<Document>, u64), IngestError> {
    config.validate()?;

    let mut documents = Vec::new();
    let mut cursor = first_index;

    for text in chunk_by_paragraph(section_text, config) {
        documents.push(Document {
            chunk_id: make_chunk_id(source, page, cursor, &text),
            text,
            metadata: DocumentMetadata {
                source: source.to_string(),
                kind,
                page,
                chunk_index: cursor,
            },
        });
        cursor = cursor.saturating_add(1);
    }

    Ok((documents, cursor))
}

fn make_chunk_id(source: &str, page: Option<u32>, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
