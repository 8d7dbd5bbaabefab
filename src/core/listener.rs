use std::panic::{self, AssertUnwindSafe};

use log::error;

use crate::{
    core::{
        job::JobParameters,
        record::{Batch, Record},
        report::JobReport,
    },
    error::{describe_panic, BatchError},
};

/// Callbacks around a whole job run.
pub trait JobListener {
    fn before_job(&self, _parameters: &JobParameters) {}
    fn after_job(&self, _report: &JobReport) {}
}

/// Callbacks around each batch.
pub trait BatchListener<P> {
    fn before_batch_reading(&self) {}
    fn after_batch_processing(&self, _batch: &Batch<P>) {}
    fn after_batch_writing(&self, _batch: &Batch<P>) {}
    fn on_batch_writing_exception(&self, _batch: &Batch<P>, _error: &BatchError) {}
}

/// Callbacks around each record read.
pub trait RecordReaderListener<P> {
    fn before_record_reading(&self) {}
    fn after_record_reading(&self, _record: &Record<P>) {}
    fn on_record_reading_exception(&self, _error: &BatchError) {}
}

/// Callbacks around each batch write.
pub trait RecordWriterListener<P> {
    fn before_record_writing(&self, _batch: &Batch<P>) {}
    fn after_record_writing(&self, _batch: &Batch<P>) {}
    fn on_record_writing_exception(&self, _batch: &Batch<P>, _error: &BatchError) {}
}

/// Callbacks around the processing pipeline.
///
/// `before_record_processing` may transform the record or return `None` to
/// skip it entirely: a skipped record is neither filtered nor counted as an
/// error, but `after_record_processing` still fires with no output.
pub trait PipelineListener<I, O> {
    fn before_record_processing(&self, record: Record<I>) -> Option<Record<I>> {
        Some(record)
    }
    fn after_record_processing(&self, _input: &Record<I>, _output: Option<&Record<O>>) {}
    fn on_record_processing_exception(&self, _record: &Record<I>, _error: &BatchError) {}
}

/// Fan-out over the registered listeners of a job.
///
/// Registration order defines invocation order: `before*` callbacks run
/// forward, `after*` and `on*Exception` callbacks run in reverse, so
/// listeners unwind mirror-symmetrically around the work they observe.
/// Every invocation is guarded: a panicking listener is logged and its
/// peers are still notified.
pub(crate) struct ListenerHub<I, O> {
    job: Vec<Box<dyn JobListener + Send>>,
    batch: Vec<Box<dyn BatchListener<O> + Send>>,
    reader: Vec<Box<dyn RecordReaderListener<I> + Send>>,
    writer: Vec<Box<dyn RecordWriterListener<O> + Send>>,
    pipeline: Vec<Box<dyn PipelineListener<I, O> + Send>>,
}

impl<I, O> ListenerHub<I, O> {
    pub(crate) fn new() -> Self {
        ListenerHub {
            job: Vec::new(),
            batch: Vec::new(),
            reader: Vec::new(),
            writer: Vec::new(),
            pipeline: Vec::new(),
        }
    }

    pub(crate) fn add_job_listener(&mut self, listener: Box<dyn JobListener + Send>) {
        self.job.push(listener);
    }

    pub(crate) fn add_batch_listener(&mut self, listener: Box<dyn BatchListener<O> + Send>) {
        self.batch.push(listener);
    }

    pub(crate) fn add_reader_listener(&mut self, listener: Box<dyn RecordReaderListener<I> + Send>) {
        self.reader.push(listener);
    }

    pub(crate) fn add_writer_listener(&mut self, listener: Box<dyn RecordWriterListener<O> + Send>) {
        self.writer.push(listener);
    }

    pub(crate) fn add_pipeline_listener(&mut self, listener: Box<dyn PipelineListener<I, O> + Send>) {
        self.pipeline.push(listener);
    }

    /// Rebinds the hub to a new output type, carrying over the listeners
    /// that do not depend on it. Fails if any output-typed listener is
    /// already registered.
    pub(crate) fn retype<T>(self) -> Result<ListenerHub<I, T>, &'static str> {
        if self.batch.is_empty() && self.writer.is_empty() && self.pipeline.is_empty() {
            Ok(ListenerHub {
                job: self.job,
                reader: self.reader,
                batch: Vec::new(),
                writer: Vec::new(),
                pipeline: Vec::new(),
            })
        } else {
            Err("batch, writer and pipeline listeners must be registered after the last processor")
        }
    }

    pub(crate) fn before_job(&self, parameters: &JobParameters) {
        for listener in &self.job {
            guard("job listener", || listener.before_job(parameters));
        }
    }

    pub(crate) fn after_job(&self, report: &JobReport) {
        for listener in self.job.iter().rev() {
            guard("job listener", || listener.after_job(report));
        }
    }

    pub(crate) fn before_batch_reading(&self) {
        for listener in &self.batch {
            guard("batch listener", || listener.before_batch_reading());
        }
    }

    pub(crate) fn after_batch_processing(&self, batch: &Batch<O>) {
        for listener in self.batch.iter().rev() {
            guard("batch listener", || listener.after_batch_processing(batch));
        }
    }

    pub(crate) fn after_batch_writing(&self, batch: &Batch<O>) {
        for listener in self.batch.iter().rev() {
            guard("batch listener", || listener.after_batch_writing(batch));
        }
    }

    pub(crate) fn on_batch_writing_exception(&self, batch: &Batch<O>, error: &BatchError) {
        for listener in self.batch.iter().rev() {
            guard("batch listener", || {
                listener.on_batch_writing_exception(batch, error)
            });
        }
    }

    pub(crate) fn before_record_reading(&self) {
        for listener in &self.reader {
            guard("reader listener", || listener.before_record_reading());
        }
    }

    pub(crate) fn after_record_reading(&self, record: &Record<I>) {
        for listener in self.reader.iter().rev() {
            guard("reader listener", || listener.after_record_reading(record));
        }
    }

    pub(crate) fn on_record_reading_exception(&self, error: &BatchError) {
        for listener in self.reader.iter().rev() {
            guard("reader listener", || {
                listener.on_record_reading_exception(error)
            });
        }
    }

    pub(crate) fn before_record_writing(&self, batch: &Batch<O>) {
        for listener in &self.writer {
            guard("writer listener", || listener.before_record_writing(batch));
        }
    }

    pub(crate) fn after_record_writing(&self, batch: &Batch<O>) {
        for listener in self.writer.iter().rev() {
            guard("writer listener", || listener.after_record_writing(batch));
        }
    }

    pub(crate) fn on_record_writing_exception(&self, batch: &Batch<O>, error: &BatchError) {
        for listener in self.writer.iter().rev() {
            guard("writer listener", || {
                listener.on_record_writing_exception(batch, error)
            });
        }
    }

    /// Applies every pipeline listener's pre-processing hook in forward
    /// order, chaining outputs. `Ok(None)` means a hook skipped the record;
    /// a panicking hook is surfaced as a pipeline error for that record.
    pub(crate) fn before_record_processing(
        &self,
        record: Record<I>,
    ) -> Result<Option<Record<I>>, BatchError> {
        let mut current = record;
        for listener in &self.pipeline {
            match panic::catch_unwind(AssertUnwindSafe(move || {
                listener.before_record_processing(current)
            })) {
                Ok(Some(next)) => current = next,
                Ok(None) => return Ok(None),
                Err(payload) => {
                    return Err(BatchError::Panic(format!(
                        "pipeline listener: {}",
                        describe_panic(payload.as_ref())
                    )))
                }
            }
        }
        Ok(Some(current))
    }

    pub(crate) fn after_record_processing(&self, input: &Record<I>, output: Option<&Record<O>>) {
        for listener in self.pipeline.iter().rev() {
            guard("pipeline listener", || {
                listener.after_record_processing(input, output)
            });
        }
    }

    pub(crate) fn on_record_processing_exception(&self, record: &Record<I>, error: &BatchError) {
        for listener in self.pipeline.iter().rev() {
            guard("pipeline listener", || {
                listener.on_record_processing_exception(record, error)
            });
        }
    }
}

fn guard(what: &str, call: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
        error!(
            "{what} panicked ({}); remaining listeners still notified",
            describe_panic(payload.as_ref())
        );
    }
}
