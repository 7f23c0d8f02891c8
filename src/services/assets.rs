//! Logo asset pool and filename matching
//!
//! One pool is shared read-only by every row of a batch. Matching a row's
//! logo reference never fails the row: a miss is surfaced as a soft warning
//! by the orchestrator.

use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// An uploaded binary asset, addressed by filename.
#[derive(Debug, Clone)]
pub struct AssetFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Pool of assets uploaded alongside a batch.
#[derive(Debug, Clone, Default)]
pub struct AssetPool {
    files: Vec<AssetFile>,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetPool {
    pub fn new(files: Vec<AssetFile>) -> Self {
        Self { files }
    }

    /// Load a pool from an uploaded ZIP. Directories, empty entries and
    /// archive junk (`__MACOSX`, dotfiles) are skipped.
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut files = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() || entry.name().starts_with("__MACOSX") {
                continue;
            }
            let name = match Path::new(entry.name()).file_name().and_then(|n| n.to_str()) {
                Some(n) if !n.is_empty() && !n.starts_with('.') => n.to_string(),
                _ => continue,
            };
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            if buf.is_empty() {
                continue;
            }
            files.push(AssetFile { name, bytes: buf });
        }

        debug!("Loaded {} assets from ZIP", files.len());
        Ok(Self { files })
    }

    /// Load a pool from a local directory (CLI mode). Non-recursive.
    pub fn from_dir(dir: &Path) -> Result<Self, AssetError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = match entry.file_name().to_str() {
                Some(n) if !n.starts_with('.') => n.to_string(),
                _ => continue,
            };
            let bytes = std::fs::read(entry.path())?;
            files.push(AssetFile { name, bytes });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve a row's logo reference against the pool.
    ///
    /// Priority, first hit wins: exact filename, case-insensitive filename,
    /// stem before the final `.` (case-insensitive). An empty reference or a
    /// miss returns `None`.
    pub fn find(&self, reference: &str) -> Option<&AssetFile> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(hit) = self.files.iter().find(|f| f.name == reference) {
            return Some(hit);
        }

        let reference_lower = reference.to_lowercase();
        if let Some(hit) = self
            .files
            .iter()
            .find(|f| f.name.to_lowercase() == reference_lower)
        {
            return Some(hit);
        }

        let reference_stem = stem(&reference_lower);
        self.files
            .iter()
            .find(|f| stem(&f.name.to_lowercase()) == reference_stem)
    }
}

/// Substring before the final `.`, or the whole string when there is none.
fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}
