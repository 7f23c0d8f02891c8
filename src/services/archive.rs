//! Archive assembly
//!
//! Packs every successfully rendered document into one ZIP. Filename
//! collisions between rows are resolved deterministically: the first
//! occurrence keeps the bare name, later ones get their row number appended
//! before the extension.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::types::RenderedDoc;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the download ZIP from rendered documents.
pub fn build_archive(docs: &[RenderedDoc]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut seen = HashSet::new();

    for doc in docs {
        let entry_name = unique_entry_name(&doc.filename, doc.row_number, &mut seen);
        if entry_name != doc.filename {
            debug!(
                filename = doc.filename,
                entry = entry_name,
                "Archive filename collision, appended row number"
            );
        }
        writer.start_file(&entry_name, options)?;
        writer.write_all(&doc.bytes)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

fn unique_entry_name(filename: &str, row_number: u32, seen: &mut HashSet<String>) -> String {
    if seen.insert(filename.to_string()) {
        return filename.to_string();
    }
    // Row numbers are unique within a batch, so one suffix pass suffices.
    let disambiguated = match filename.rfind('.') {
        Some(idx) if idx > 0 => {
            format!("{}_{}{}", &filename[..idx], row_number, &filename[idx..])
        }
        _ => format!("{}_{}", filename, row_number),
    };
    seen.insert(disambiguated.clone());
    disambiguated
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn doc(filename: &str, row_number: u32, bytes: &[u8]) -> RenderedDoc {
        RenderedDoc {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
            row_number,
        }
    }

    fn entry_names(archive_bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(archive_bytes)).unwrap();
        archive.file_names().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_archive_contains_each_document() {
        let docs = vec![
            doc("Acme_Ltd_9001_draft.pdf", 1, b"pdf-one"),
            doc("Beta_Co_14001_draft.pdf", 2, b"pdf-two"),
        ];
        let bytes = build_archive(&docs).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = Vec::new();
        std::io::Read::read_to_end(
            &mut archive.by_name("Acme_Ltd_9001_draft.pdf").unwrap(),
            &mut content,
        )
        .unwrap();
        assert_eq!(content, b"pdf-one");
    }

    #[test]
    fn test_collision_gets_row_number_suffix() {
        let docs = vec![
            doc("Acme_Ltd_9001_draft.pdf", 1, b"one"),
            doc("Acme_Ltd_9001_draft.pdf", 3, b"three"),
        ];
        let bytes = build_archive(&docs).unwrap();

        let mut names = entry_names(&bytes);
        names.sort();
        assert_eq!(
            names,
            vec![
                "Acme_Ltd_9001_draft.pdf".to_string(),
                "Acme_Ltd_9001_draft_3.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_collision_without_extension_appends_plain_suffix() {
        let docs = vec![doc("report", 1, b"one"), doc("report", 2, b"two")];
        let bytes = build_archive(&docs).unwrap();

        let mut names = entry_names(&bytes);
        names.sort();
        assert_eq!(names, vec!["report".to_string(), "report_2".to_string()]);
    }
}
