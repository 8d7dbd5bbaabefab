use std::sync::{Arc, Mutex};

use crate::core::{
    pipeline::{RecordProcessor, StageResult},
    record::Record,
};

/// Pass-through processor that keeps a copy of every record it sees.
///
/// Clones share their storage, so a collector can be handed to a job while
/// the caller keeps a handle to inspect what reached that point of the
/// pipeline once the run is over.
pub struct RecordCollector<P> {
    records: Arc<Mutex<Vec<Record<P>>>>,
}

impl<P> RecordCollector<P> {
    pub fn new() -> Self {
        RecordCollector {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of records collected so far.
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// The records collected so far, in processing order.
    pub fn records(&self) -> Vec<Record<P>>
    where
        P: Clone,
    {
        self.records.lock().unwrap().clone()
    }
}

impl<P> Default for RecordCollector<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for RecordCollector<P> {
    fn clone(&self) -> Self {
        RecordCollector {
            records: Arc::clone(&self.records),
        }
    }
}

impl<P: Clone> RecordProcessor<P, P> for RecordCollector<P> {
    fn process(&mut self, record: Record<P>) -> StageResult<P> {
        self.records.lock().unwrap().push(record.clone());
        Ok(Some(record))
    }
}
