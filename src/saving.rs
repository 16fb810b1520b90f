use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::history::{HistoryEntry, HistoryError};

/// Write history entries as a gzip-compressed bincode archive.
pub fn write_history_archive<W: Write>(
    entries: &[HistoryEntry],
    writer: W,
) -> Result<(), HistoryError> {
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, entries)?;

    let encoder = writer
        .into_inner()
        .map_err(|e| HistoryError::Io(e.into_error()))?;
    encoder.finish()?;
    Ok(())
}

pub fn read_history_archive<R: Read>(reader: R) -> Result<Vec<HistoryEntry>, HistoryError> {
    let decoder = GzDecoder::new(reader);
    let mut reader = BufReader::new(decoder);

    let entries: Vec<HistoryEntry> = deserialize_from(&mut reader)?;

    Ok(entries)
}

pub fn save_history_archive(entries: &[HistoryEntry], filename: &Path) -> Result<(), HistoryError> {
    let file = File::create(filename)?;
    write_history_archive(entries, file)
}

pub fn load_history_archive(filename: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    let file = File::open(filename)?;
    read_history_archive(file)
}

/// Archive held in memory, for download responses.
pub fn history_archive_bytes(entries: &[HistoryEntry]) -> Result<Vec<u8>, HistoryError> {
    let mut buffer = Vec::new();
    write_history_archive(entries, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry::new("5 + 3", 8.0, "2026-01-01T00:00:00.000Z"),
            HistoryEntry::new("5 / 0", f64::INFINITY, "2026-01-01T00:00:01.000Z"),
        ]
    }

    #[test]
    fn archive_file_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.bin.gz");

        save_history_archive(&sample(), &path).unwrap();
        let loaded = load_history_archive(&path).unwrap();

        assert_eq!(loaded, sample());
    }

    #[test]
    fn archive_bytes_are_gzip() {
        let bytes = history_archive_bytes(&sample()).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(read_history_archive(bytes.as_slice()).unwrap(), sample());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(read_history_archive(&b"not an archive"[..]).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_history_archive(&dir.path().join("missing.bin.gz")).unwrap_err();
        assert!(matches!(err, HistoryError::Io(_)));
    }
}
