//! ZIP extraction for downloaded archives.
//!
//! HistData archives hold one semicolon-separated `.csv` file next to a
//! status `.txt`; only the first CSV entry is read.

use std::io::{Cursor, Read};

use snafu::{Backtrace, ResultExt, Snafu};
use tracing::debug;
use zip::{ZipArchive, result::ZipError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExtractionError {
    /// The bytes are not a readable ZIP archive.
    #[snafu(display("Corrupt archive: {source}"))]
    CorruptArchive {
        source: ZipError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to open archive entry {name:?}: {source}"))]
    OpenEntry {
        name: String,
        source: ZipError,
        backtrace: Backtrace,
    },

    /// The archive has no `.csv` entry.
    #[snafu(display("Archive contains no CSV entry (entries: {entries:?})"))]
    NoDataEntry {
        entries: Vec<String>,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to read archive entry {name:?}: {source}"))]
    ReadEntry {
        name: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Archive entry {name:?} is not valid UTF-8: {source}"))]
    EncodingError {
        name: String,
        source: std::string::FromUtf8Error,
        backtrace: Backtrace,
    },
}

/// Decoded content of the data entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    pub entry_name: String,
    pub text: String,
}

/// Opens `bytes` as a ZIP archive and decodes its first `.csv` entry, in
/// central-directory order. The extension match ignores case.
pub fn extract_table(bytes: &[u8]) -> Result<ExtractedTable, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context(CorruptArchiveSnafu)?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut data_entry = None;
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).context(CorruptArchiveSnafu)?;
        let name = entry.name().to_string();
        if !entry.is_dir() && name.to_ascii_lowercase().ends_with(".csv") {
            data_entry = Some((index, name));
            break;
        }
        entries.push(name);
    }

    let Some((index, entry_name)) = data_entry else {
        return NoDataEntrySnafu { entries }.fail();
    };

    let mut entry = archive
        .by_index(index)
        .context(OpenEntrySnafu { name: entry_name.as_str() })?;
    let mut raw = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
    entry
        .read_to_end(&mut raw)
        .context(ReadEntrySnafu { name: entry_name.as_str() })?;
    let text = String::from_utf8(raw).context(EncodingSnafu { name: entry_name.as_str() })?;

    debug!(entry = %entry_name, bytes = text.len(), "extracted data entry");
    Ok(ExtractedTable { entry_name, text })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;

    /// Builds an in-memory archive from `(name, content)` entries.
    pub(crate) fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn picks_first_csv_entry() {
        let bytes = zip_of(&[
            ("DAT_ASCII_EURUSD_M1_202301.txt", b"status"),
            ("DAT_ASCII_EURUSD_M1_202301.csv", b"20230103 220000;1.0531;1.0534;1.0530;1.0533;0\n"),
            ("second.csv", b"ignored"),
        ]);

        let table = extract_table(&bytes).unwrap();
        assert_eq!(table.entry_name, "DAT_ASCII_EURUSD_M1_202301.csv");
        assert!(table.text.starts_with("20230103 220000;"));
    }

    #[test]
    fn extension_match_ignores_case() {
        let bytes = zip_of(&[("DATA.CSV", b"x")]);
        assert_eq!(extract_table(&bytes).unwrap().entry_name, "DATA.CSV");
    }

    #[test]
    fn corrupt_bytes() {
        let err = extract_table(b"<html>Too many requests</html>").unwrap_err();
        assert!(matches!(err, ExtractionError::CorruptArchive { .. }));
    }

    #[test]
    fn archive_without_csv() {
        let bytes = zip_of(&[("readme.txt", b"hello"), ("data.csv.bak", b"x")]);
        match extract_table(&bytes).unwrap_err() {
            ExtractionError::NoDataEntry { entries, .. } => {
                assert_eq!(entries, vec!["readme.txt", "data.csv.bak"]);
            }
            other => panic!("expected NoDataEntry, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8() {
        let bytes = zip_of(&[("data.csv", &[0x32, 0x30, 0xff, 0xfe])]);
        let err = extract_table(&bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::EncodingError { ref name, .. } if name == "data.csv"));
    }
}
