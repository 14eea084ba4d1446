use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::harvest::traits::{RecordSink, SinkError};
use crate::model::ProductRecord;

/// One JSON object per line; absent fields serialize as `null`.
pub struct JsonLinesSink {
    writer: Option<BufWriter<File>>,
    rows: usize,
}

impl JsonLinesSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Ok(Self {
            writer: Some(BufWriter::new(File::create(path)?)),
            rows: 0,
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, record: &ProductRecord) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        serde_json::to_writer(&mut *writer, record).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<usize, SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(self.rows)
    }
}
