use crate::error::IngestError;
use crate::models::DocumentKind;
use lopdf::Document as PdfDocument;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// A section of extracted text. PDFs yield one per page, other formats one
/// per file.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub number: Option<u32>,
    pub text: String,
}

pub trait DocumentParser {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl DocumentParser for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: Some(page_no),
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

#[derive(Debug, Default)]
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|_| IngestError::Encoding(path.to_path_buf()))?;
        Ok(vec![PageText { number: None, text }])
    }
}

#[derive(Debug, Default)]
pub struct DocxParser;

impl DocumentParser for DocxParser {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut xml = String::new();
        archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

        Ok(vec![PageText {
            number: None,
            text: extract_plaintext_from_docx_xml(&xml)?,
        }])
    }
}

/// Pulls run text out of a WordprocessingML body. Paragraphs end with a
/// blank line so the chunker sees them as separate paragraphs.
pub fn extract_plaintext_from_docx_xml(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                if element.name().as_ref() == b"w:t" {
                    in_run_text = true;
                }
            }
            Event::End(element) => match element.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Text(content) if in_run_text => {
                text.push_str(&content.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

impl DocumentKind {
    pub fn parse(self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        match self {
            Self::Pdf => LopdfExtractor.extract_pages(path),
            Self::Text => PlainTextParser.extract_pages(path),
            Self::Docx => DocxParser.extract_pages(path),
        }
    }
}
