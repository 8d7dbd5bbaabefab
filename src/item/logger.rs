use std::fmt::Debug;

use log::info;

use crate::core::{
    io::{RecordWriter, WriteResult},
    record::Batch,
};

/// Writes records to the application log, one `info` line per record.
#[derive(Debug, Default)]
pub struct LoggerWriter;

impl LoggerWriter {
    pub fn new() -> Self {
        LoggerWriter
    }
}

impl<P: Debug> RecordWriter<P> for LoggerWriter {
    fn write(&mut self, batch: &Batch<P>) -> WriteResult {
        for record in batch {
            info!(
                "record #{} from {}: {:?}",
                record.header().number(),
                record.header().source(),
                record.payload()
            );
        }
        Ok(())
    }
}
