//! Output format implementations of [`RecordSink`](crate::harvest::RecordSink).
//!
//! - `delimited` - CSV / TSV with a header row
//! - `jsonl` - newline-delimited JSON objects

pub mod delimited;
pub mod jsonl;

use std::path::Path;

use crate::harvest::traits::{RecordSink, SinkError};

pub use delimited::DelimitedSink;
pub use jsonl::JsonLinesSink;

/// Opens the sink matching the output file's extension.
///
/// `.jsonl` / `.ndjson` write JSON lines, `.tsv` is tab-delimited, anything
/// else uses `delimiter`.
pub fn open_sink(path: &Path, delimiter: u8) -> Result<Box<dyn RecordSink>, SinkError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    Ok(match extension.as_deref() {
        Some("jsonl") | Some("ndjson") => Box::new(JsonLinesSink::create(path)?),
        Some("tsv") => Box::new(DelimitedSink::create(path, b'\t')?),
        _ => Box::new(DelimitedSink::create(path, delimiter)?),
    })
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write(&mut self, record: &crate::model::ProductRecord) -> Result<(), SinkError> {
        (**self).write(record)
    }

    fn finish(&mut self) -> Result<usize, SinkError> {
        (**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductRecord;

    #[test]
    fn test_open_sink_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let record = ProductRecord {
            product_id: Some("B1".into()),
            ..Default::default()
        };

        for (name, first_line) in [
            ("out.tsv", "product_id\timage_url\tprice"),
            ("out.csv", "product_id,image_url,price"),
            ("out.jsonl", "{\"product_id\":\"B1\""),
        ] {
            let path = dir.path().join(name);
            let mut sink = open_sink(&path, b',').unwrap();
            sink.write(&record).unwrap();
            sink.finish().unwrap();
            let contents = std::fs::read_to_string(&path).unwrap();
            assert!(contents.starts_with(first_line), "{}: {}", name, contents);
        }
    }
}
