use crate::{core::record::Batch, error::BatchError};

/// Result of reading one payload from a data source.
///
/// - `Ok(Some(payload))` when a payload was read
/// - `Ok(None)` when the source is exhausted
/// - `Err(BatchError)` when the read failed
pub type ReadResult<P> = Result<Option<P>, BatchError>;

/// Result of writing one batch to a data sink.
pub type WriteResult = Result<(), BatchError>;

/// A source of record payloads.
///
/// The engine wraps each payload in a [`crate::core::record::Record`],
/// assigning the 1-based sequence number and stamping the source name
/// reported by [`RecordReader::source_name`].
pub trait RecordReader<P> {
    /// Called once before the first read. Acquire resources here.
    fn open(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Reads the next payload, or `Ok(None)` once the source is exhausted.
    fn read(&mut self) -> ReadResult<P>;

    /// Called exactly once at the end of the run, on every outcome,
    /// including after a failed [`RecordReader::open`], so implementations
    /// must tolerate closing resources that were never acquired.
    fn close(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Name recorded in the header of every record read from this source.
    fn source_name(&self) -> &str {
        "unknown source"
    }
}

/// A sink accepting records one batch at a time.
pub trait RecordWriter<P> {
    /// Called once before the first write. Acquire resources here.
    fn open(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Writes all records of the batch, atomically from the engine's point
    /// of view: a failure counts the whole batch as unwritten.
    fn write(&mut self, batch: &Batch<P>) -> WriteResult;

    /// Called exactly once at the end of the run, on every outcome; must be
    /// safe after a failed [`RecordWriter::open`].
    fn close(&mut self) -> Result<(), BatchError> {
        Ok(())
    }
}
