use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::harvest::traits::{RecordSink, SinkError};
use crate::model::ProductRecord;

/// Delimited text output (CSV by default) with the header taken from the
/// first record written.
///
/// The file is truncated on open and flushed after every row, so a crash
/// loses at most the row being written.
pub struct DelimitedSink {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
    header: Option<Vec<String>>,
    rows: usize,
}

impl DelimitedSink {
    pub fn create(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_writer(file);
        debug!(path = %path.display(), "Opened output");
        Ok(Self {
            writer: Some(writer),
            path,
            header: None,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Writes one row of named cells, emitting the header on the first call.
    ///
    /// # Errors
    ///
    /// [`SinkError::HeaderMismatch`] if the names differ from the header
    /// fixed by the first row; nothing is written in that case.
    pub fn write_fields<N: AsRef<str>>(&mut self, fields: &[(N, String)]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        let names: Vec<String> = fields.iter().map(|(n, _)| n.as_ref().to_string()).collect();

        if let Some(expected) = &self.header {
            if expected != &names {
                return Err(SinkError::HeaderMismatch {
                    expected: expected.clone(),
                    actual: names,
                });
            }
        } else {
            writer.write_record(&names)?;
            self.header = Some(names);
        }

        writer.write_record(fields.iter().map(|(_, v)| v.as_str()))?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

impl RecordSink for DelimitedSink {
    fn write(&mut self, record: &ProductRecord) -> Result<(), SinkError> {
        self.write_fields(&record.to_fields())
    }

    fn finish(&mut self) -> Result<usize, SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            debug!(path = %self.path.display(), rows = self.rows, "Closed output");
        }
        Ok(self.rows)
    }
}

impl Drop for DelimitedSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "Failed to flush output on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, description: &str) -> ProductRecord {
        ProductRecord {
            product_id: Some(id.to_string()),
            price: Some(19.9),
            currency: Some("EUR".to_string()),
            availability: 3,
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_rows_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");

        let mut sink = DelimitedSink::create(&path, b',').unwrap();
        for i in 0..3 {
            sink.write(&record(&format!("B{}", i), "Crema, viso\nidratante")).unwrap();
        }
        assert_eq!(sink.finish().unwrap(), 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, ProductRecord::FIELD_NAMES);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "B0");
        assert_eq!(&rows[0][1], "");
        assert_eq!(&rows[0][2], "19.9");
        assert_eq!(&rows[2][7], "Crema, viso\nidratante");
    }

    #[test]
    fn test_no_records_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "stale contents from a previous run").unwrap();

        let mut sink = DelimitedSink::create(&path, b',').unwrap();
        assert_eq!(sink.finish().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_mismatched_fields_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.tsv");

        let mut sink = DelimitedSink::create(&path, b'\t').unwrap();
        sink.write_fields(&[("a", "1".to_string()), ("b", "2".to_string())]).unwrap();
        let err = sink
            .write_fields(&[("a", "1".to_string()), ("c", "3".to_string())])
            .unwrap_err();
        assert!(matches!(err, SinkError::HeaderMismatch { .. }));
        assert_eq!(sink.finish().unwrap(), 1);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\tb\n1\t2\n");
    }

    #[test]
    fn test_rows_are_visible_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");

        let mut sink = DelimitedSink::create(&path, b',').unwrap();
        sink.write(&record("B9", "")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        drop(sink);
    }

    #[test]
    fn test_write_after_finish_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DelimitedSink::create(dir.path().join("closed.csv"), b',').unwrap();
        sink.finish().unwrap();
        assert!(matches!(sink.write(&record("B1", "")), Err(SinkError::Closed)));
    }
}
