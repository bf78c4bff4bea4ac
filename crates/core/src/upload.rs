use crate::error::IngestError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedFile {
    pub destination: PathBuf,
    /// False when an identical file was already in place.
    pub copied: bool,
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copies `sources` into `data_dir` under their own file names so the next
/// run picks them up.
pub fn add_files<P: AsRef<Path>>(data_dir: &Path, sources: &[P]) -> Result<Vec<AddedFile>, IngestError> {
    fs::create_dir_all(data_dir)?;

    let mut added = Vec::new();
    for source in sources {
        let source = source.as_ref();
        if !source.is_file() {
            return Err(IngestError::InvalidArgument(format!(
                "not a file: {}",
                source.display()
            )));
        }

        let name = source
            .file_name()
            .ok_or_else(|| IngestError::MissingFileName(source.display().to_string()))?;
        let destination = data_dir.join(name);

        let unchanged = destination.is_file() && digest_file(&destination)? == digest_file(source)?;
        if !unchanged {
            fs::copy(source, &destination)?;
            info!(source = %source.display(), destination = %destination.display(), "added file");
        }

        added.push(AddedFile {
            destination,
            copied: !unchanged,
        });
    }

    Ok(added)
}
