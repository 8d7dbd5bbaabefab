use crate::core::{
    io::{RecordWriter, WriteResult},
    record::Batch,
};

/// Discards every batch; the sink of jobs built without a writer.
#[derive(Debug, Default)]
pub struct NoOpRecordWriter;

impl NoOpRecordWriter {
    pub fn new() -> Self {
        NoOpRecordWriter
    }
}

impl<P> RecordWriter<P> for NoOpRecordWriter {
    fn write(&mut self, _batch: &Batch<P>) -> WriteResult {
        Ok(())
    }
}
