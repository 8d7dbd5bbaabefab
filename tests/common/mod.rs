#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use batchflow::{
    core::{
        io::{ReadResult, RecordReader, RecordWriter, WriteResult},
        record::Batch,
    },
    error::BatchError,
};

/// Shared log of the batches a [`SavingWriter`] received.
pub type BatchLog<P> = Arc<Mutex<Vec<Batch<P>>>>;

/// Writer keeping a copy of every batch it is asked to write, optionally
/// rejecting batches matching a predicate.
///
/// Saved batches clone the records they hold, so their headers stay shared
/// with the engine's copies.
pub struct SavingWriter<P> {
    batches: BatchLog<P>,
    fail_when: Option<Box<dyn Fn(&Batch<P>) -> bool + Send>>,
}

impl<P> SavingWriter<P> {
    pub fn new() -> Self {
        SavingWriter {
            batches: Arc::default(),
            fail_when: None,
        }
    }

    /// A writer rejecting every batch the predicate matches. The batch is
    /// still saved, so tests can assert on what was presented.
    pub fn failing_when(predicate: impl Fn(&Batch<P>) -> bool + Send + 'static) -> Self {
        SavingWriter {
            batches: Arc::default(),
            fail_when: Some(Box::new(predicate)),
        }
    }

    /// Handle on the saved batches, to keep before moving the writer into
    /// a job.
    pub fn log(&self) -> BatchLog<P> {
        Arc::clone(&self.batches)
    }
}

impl<P: Clone> RecordWriter<P> for SavingWriter<P> {
    fn write(&mut self, batch: &Batch<P>) -> WriteResult {
        self.batches.lock().unwrap().push(batch.clone());
        if let Some(fail_when) = &self.fail_when {
            if fail_when(batch) {
                return Err(BatchError::Writer("batch rejected".to_string()));
            }
        }
        Ok(())
    }
}

/// Reader over an in-memory collection that counts its `close` calls.
pub struct TrackedReader<P> {
    items: std::vec::IntoIter<P>,
    close_count: Arc<AtomicUsize>,
    fail_at_read: Option<usize>,
    reads: usize,
}

impl<P> TrackedReader<P> {
    pub fn new(items: Vec<P>) -> Self {
        TrackedReader {
            items: items.into_iter(),
            close_count: Arc::default(),
            fail_at_read: None,
            reads: 0,
        }
    }

    /// Makes the `index`-th read call (1-based) fail.
    pub fn failing_at_read(mut self, index: usize) -> Self {
        self.fail_at_read = Some(index);
        self
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }
}

impl<P> RecordReader<P> for TrackedReader<P> {
    fn read(&mut self) -> ReadResult<P> {
        self.reads += 1;
        if self.fail_at_read == Some(self.reads) {
            return Err(BatchError::Reader("tracked read failure".to_string()));
        }
        Ok(self.items.next())
    }

    fn close(&mut self) -> Result<(), BatchError> {
        self.close_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn source_name(&self) -> &str {
        "tracked collection"
    }
}

/// Writer that accepts everything and counts its `close` calls; `close`
/// can be made to fail while still being counted.
pub struct TrackedWriter {
    close_count: Arc<AtomicUsize>,
    fail_on_close: bool,
}

impl TrackedWriter {
    pub fn new() -> Self {
        TrackedWriter {
            close_count: Arc::default(),
            fail_on_close: false,
        }
    }

    pub fn failing_on_close(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }
}

impl<P> RecordWriter<P> for TrackedWriter {
    fn write(&mut self, _batch: &Batch<P>) -> WriteResult {
        Ok(())
    }

    fn close(&mut self) -> Result<(), BatchError> {
        self.close_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_on_close {
            Err(BatchError::Writer("tracked close failure".to_string()))
        } else {
            Ok(())
        }
    }
}
