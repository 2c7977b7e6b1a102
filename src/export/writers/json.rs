//! JSON array writer for export output
//!
//! Frames records as elements of a single top-level JSON array:
//!
//! ```text
//! [
//! {"key":"a","type":"string","value":"1"},
//! {"key":"b","type":"string","value":"2"}
//! ]
//! ```
//!
//! The opening bracket goes out with the first element, so a run that fails
//! before producing anything leaves an empty file rather than a dangling `[`.

use tracing::{debug, error};

use crate::error::Result;
use crate::export::progress::ProgressTracker;
use crate::export::record::Record;

use super::OutputSink;

/// Single writer over an output sink.
pub struct JsonArrayWriter {
    /// Destination stream
    sink: Box<dyn OutputSink>,
    /// Whether `[` has been emitted
    opened: bool,
    /// Number of elements written
    written: u64,
    /// Shared processed counter
    progress: ProgressTracker,
}

impl JsonArrayWriter {
    pub fn new(sink: Box<dyn OutputSink>, progress: ProgressTracker) -> Self {
        Self {
            sink,
            opened: false,
            written: 0,
            progress,
        }
    }

    /// Append one record as an array element.
    ///
    /// The record is encoded before anything reaches the sink; an encoding
    /// failure is scoped to that record and leaves the stream untouched.
    ///
    /// # Returns
    /// * `Result<bool>` - Whether the element was written; `Err` on sink failure
    pub async fn write_record(&mut self, record: &Record) -> Result<bool> {
        let encoded = match record.to_json_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(key = %record.key, "Error encoding entry: {}", e);
                return Ok(false);
            }
        };

        let separator: &[u8] = if self.opened { b",\n" } else { b"[\n" };
        let mut element = Vec::with_capacity(separator.len() + encoded.len());
        element.extend_from_slice(separator);
        element.extend_from_slice(&encoded);

        self.sink.write(&element).await?;
        self.opened = true;
        self.written += 1;
        self.progress.increment();
        Ok(true)
    }

    /// Close the array and the sink.
    ///
    /// # Returns
    /// * `Result<u64>` - Number of elements written
    pub async fn finish(&mut self) -> Result<u64> {
        let closing: &[u8] = if self.opened { b"\n]\n" } else { b"[\n]\n" };
        self.sink.write(closing).await?;
        self.opened = true;
        self.sink.close().await?;

        debug!(
            "Finalized JSON array: {} ({} records, {} bytes)",
            self.sink.describe(),
            self.written,
            self.sink.bytes_written()
        );
        Ok(self.written)
    }

    /// Close the sink without terminating the array.
    ///
    /// Used after a fatal error: whatever was flushed stays as is.
    pub async fn abandon(&mut self) -> Result<()> {
        self.sink.close().await
    }

    /// Number of elements written
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Bytes accepted by the sink
    pub fn bytes_written(&self) -> u64 {
        self.sink.bytes_written()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::record::KeyValue;
    use crate::export::writers::MemorySink;

    fn record(key: &str, value: &str) -> Record {
        Record::new(key, KeyValue::String(value.into()), -1)
    }

    #[tokio::test]
    async fn test_single_element_array() {
        let sink = MemorySink::new();
        let mut writer = JsonArrayWriter::new(Box::new(sink.clone()), ProgressTracker::new(false));

        assert!(writer.write_record(&record("test:key", "test value")).await.unwrap());
        assert_eq!(writer.finish().await.unwrap(), 1);

        let parsed: serde_json::Value = serde_json::from_slice(&sink.contents()).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{"key": "test:key", "type": "string", "value": "test value"}])
        );
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_multiple_elements_and_counter() {
        let sink = MemorySink::new();
        let progress = ProgressTracker::new(false);
        let mut writer = JsonArrayWriter::new(Box::new(sink.clone()), progress.clone());

        for i in 0..3 {
            writer.write_record(&record(&format!("k{i}"), "v")).await.unwrap();
        }
        writer.finish().await.unwrap();

        assert_eq!(
            sink.contents_string(),
            "[\n{\"key\":\"k0\",\"type\":\"string\",\"value\":\"v\"},\n\
             {\"key\":\"k1\",\"type\":\"string\",\"value\":\"v\"},\n\
             {\"key\":\"k2\",\"type\":\"string\",\"value\":\"v\"}\n]\n"
        );
        assert_eq!(progress.processed(), 3);
        assert_eq!(writer.bytes_written(), sink.contents().len() as u64);
    }

    #[tokio::test]
    async fn test_empty_array() {
        let sink = MemorySink::new();
        let mut writer = JsonArrayWriter::new(Box::new(sink.clone()), ProgressTracker::new(false));
        assert_eq!(writer.finish().await.unwrap(), 0);

        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&sink.contents()).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn test_abandon_before_first_element_leaves_nothing() {
        let sink = MemorySink::new();
        let mut writer = JsonArrayWriter::new(Box::new(sink.clone()), ProgressTracker::new(false));
        writer.abandon().await.unwrap();
        assert!(sink.contents().is_empty());
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_sink_failure_is_reported_and_not_counted() {
        let sink = MemorySink::new().fail_after(1);
        let progress = ProgressTracker::new(false);
        let mut writer = JsonArrayWriter::new(Box::new(sink), progress.clone());

        writer.write_record(&record("a", "1")).await.unwrap();
        assert!(writer.write_record(&record("b", "2")).await.is_err());
        assert_eq!(writer.written(), 1);
        assert_eq!(progress.processed(), 1);
    }
}
