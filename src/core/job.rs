use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::{debug, error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    core::{
        io::{RecordReader, RecordWriter},
        listener::{
            BatchListener, JobListener, ListenerHub, PipelineListener, RecordReaderListener,
            RecordWriterListener,
        },
        metrics::JobMetrics,
        monitor::{self, JobMonitor},
        pipeline::{Pipeline, RecordFilter, RecordProcessor, RecordValidator},
        record::{Batch, Header, Record},
        report::{AbortHandle, JobReport, JobStatus, RunState},
    },
    error::{describe_panic, BatchError},
    item::{IterableRecordReader, NoOpRecordWriter},
};

/// Name given to jobs that were not explicitly named.
pub const DEFAULT_JOB_NAME: &str = "job";

/// Number of records accumulated per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// By default any number of record-level errors is tolerated.
pub const DEFAULT_ERROR_THRESHOLD: u64 = u64::MAX;

/// Configuration of one batch job.
#[derive(Debug, Clone, Serialize)]
pub struct JobParameters {
    pub name: String,
    /// Records accumulated before a write; at least 1.
    pub batch_size: usize,
    /// Maximum tolerated error count; one more fails the job.
    pub error_threshold: u64,
    /// Registers a [`JobMonitor`] in the process-wide registry.
    pub enable_monitoring: bool,
    /// Re-writes the records of a failed batch one by one to isolate
    /// poison records instead of failing the job.
    pub enable_batch_scanning: bool,
}

impl Default for JobParameters {
    fn default() -> Self {
        JobParameters {
            name: DEFAULT_JOB_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            enable_monitoring: false,
            enable_batch_scanning: false,
        }
    }
}

/// A runnable batch job.
///
/// `run` consumes the job's data source and never unwinds: whatever
/// happens inside the components, a [`JobReport`] is produced.
pub trait Job {
    fn run(&mut self) -> JobReport;

    fn name(&self) -> &str;

    /// Handle through which this job, and only this job, can be asked to
    /// abort.
    fn abort_handle(&self) -> AbortHandle;
}

/// How the batch loop ended; `Completed` means the source was exhausted.
enum LoopExit {
    Completed,
    Failed(BatchError),
    Aborted,
}

/// Outcome of piping one record through the hooks and the pipeline.
enum Processed<O> {
    Accepted(Record<O>),
    Filtered,
    /// A pre-processing hook dropped the record; it counts as neither
    /// filtered nor errored.
    Skipped,
    Errored(BatchError),
}

/// The batch processing engine: reads records from a source, pipes them
/// through the configured stages and writes them to a sink in fixed-size
/// batches, driving listeners, metrics, the error threshold, batch
/// scanning and cancellation along the way.
///
/// Built through a [`JobBuilder`]; executed directly with [`Job::run`] or
/// through a [`crate::core::executor::JobExecutor`].
pub struct BatchJob<I, O> {
    id: Uuid,
    parameters: JobParameters,
    reader: Box<dyn RecordReader<I> + Send>,
    writer: Box<dyn RecordWriter<O> + Send>,
    pipeline: Pipeline<I, O>,
    listeners: ListenerHub<I, O>,
    metrics: Arc<JobMetrics>,
    state: Arc<RunState>,
}

impl<I: Clone + 'static, O: 'static> Job for BatchJob<I, O> {
    fn run(&mut self) -> JobReport {
        info!("job '{}' ({}) starting", self.parameters.name, self.id);
        self.state.set_status(JobStatus::Starting);
        self.metrics.mark_start();
        if self.parameters.enable_monitoring {
            monitor::register(JobMonitor::new(
                self.parameters.name.clone(),
                Arc::clone(&self.metrics),
                Arc::clone(&self.state),
            ));
        }
        self.listeners.before_job(&self.parameters);

        let exit = self.open_and_loop();

        let mut last_error = match exit {
            LoopExit::Failed(ref error) => Some(error.clone()),
            _ => None,
        };
        self.release_resources(&mut last_error);

        let status = match exit {
            LoopExit::Completed => JobStatus::Completed,
            LoopExit::Failed(_) => JobStatus::Failed,
            LoopExit::Aborted => JobStatus::Aborted,
        };
        if let Some(error) = &last_error {
            self.state.set_last_error(error);
        }
        self.metrics.mark_end();
        self.state.set_status(status);

        let report = JobReport::new(
            self.parameters.clone(),
            status,
            self.metrics.snapshot(),
            last_error,
        );
        self.listeners.after_job(&report);
        info!(
            "job '{}' ({}) finished with status {}",
            self.parameters.name, self.id, status
        );
        report
    }

    fn name(&self) -> &str {
        &self.parameters.name
    }

    fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(Arc::clone(&self.state))
    }
}

impl<I: Clone + 'static, O: 'static> BatchJob<I, O> {
    /// Opens the reader then the writer and runs the batch loop. A failed
    /// open fails the job without touching the other resource; closing is
    /// handled unconditionally by the caller.
    fn open_and_loop(&mut self) -> LoopExit {
        if let Err(error) = guarded("reader open", || self.reader.open()) {
            error!(
                "job '{}' could not open its reader: {error}",
                self.parameters.name
            );
            return LoopExit::Failed(error);
        }
        if let Err(error) = guarded("writer open", || self.writer.open()) {
            error!(
                "job '{}' could not open its writer: {error}",
                self.parameters.name
            );
            return LoopExit::Failed(error);
        }
        self.state.set_status(JobStatus::Started);
        self.batch_loop()
    }

    fn batch_loop(&mut self) -> LoopExit {
        loop {
            if self.state.is_abort_requested() {
                return self.aborted();
            }
            self.listeners.before_batch_reading();

            let mut buffered: Vec<Record<O>> = Vec::with_capacity(self.parameters.batch_size);
            let mut exhausted = false;
            while buffered.len() < self.parameters.batch_size {
                if self.state.is_abort_requested() {
                    return self.aborted();
                }
                self.listeners.before_record_reading();
                let payload = match guarded("record reading", || self.reader.read()) {
                    Ok(Some(payload)) => payload,
                    Ok(None) => {
                        exhausted = true;
                        break;
                    }
                    Err(error) => {
                        // Fatal: the buffered batch is dropped.
                        self.listeners.on_record_reading_exception(&error);
                        error!(
                            "job '{}' could not read the next record: {error}",
                            self.parameters.name
                        );
                        return LoopExit::Failed(error);
                    }
                };
                let number = self.metrics.inc_read_count();
                let record = Record::new(
                    Header::new(number, self.reader.source_name()),
                    payload,
                );
                self.listeners.after_record_reading(&record);

                match self.process_record(record) {
                    Processed::Accepted(output) => buffered.push(output),
                    Processed::Filtered => self.metrics.inc_filter_count(),
                    Processed::Skipped => {}
                    Processed::Errored(error) => {
                        warn!("record {number} could not be processed: {error}");
                        let total = self.metrics.add_error_count(1);
                        if total > self.parameters.error_threshold {
                            return LoopExit::Failed(BatchError::ErrorThresholdExceeded(total));
                        }
                    }
                }
            }

            if !buffered.is_empty() {
                if self.state.is_abort_requested() {
                    // The batch in hand is dropped, not written.
                    return self.aborted();
                }
                if let Some(exit) = self.write_batch(Batch::new(buffered)) {
                    return exit;
                }
            }

            if exhausted {
                return LoopExit::Completed;
            }
        }
    }

    /// Pipes one freshly read record through the pre-processing hooks and
    /// the pipeline, firing the pipeline listeners along the way.
    fn process_record(&mut self, record: Record<I>) -> Processed<O> {
        let raw = record.clone();
        let pre_processed = match self.listeners.before_record_processing(record) {
            Ok(Some(pre_processed)) => pre_processed,
            Ok(None) => {
                self.listeners.after_record_processing(&raw, None);
                return Processed::Skipped;
            }
            Err(error) => {
                self.listeners.on_record_processing_exception(&raw, &error);
                return Processed::Errored(error);
            }
        };

        let input = pre_processed.clone();
        match self.pipeline.apply(pre_processed) {
            Ok(Some(output)) => {
                self.listeners.after_record_processing(&input, Some(&output));
                Processed::Accepted(output)
            }
            Ok(None) => {
                self.listeners.after_record_processing(&input, None);
                Processed::Filtered
            }
            Err(error) => {
                self.listeners.on_record_processing_exception(&input, &error);
                Processed::Errored(error)
            }
        }
    }

    /// Writes one full or trailing batch. Returns `Some(exit)` when the
    /// failure (or an abort observed during scanning) ends the run.
    fn write_batch(&mut self, batch: Batch<O>) -> Option<LoopExit> {
        debug!(
            "job '{}' writing a batch of {} records",
            self.parameters.name,
            batch.size()
        );
        self.listeners.after_batch_processing(&batch);
        self.listeners.before_record_writing(&batch);
        match guarded("record writing", || self.writer.write(&batch)) {
            Ok(()) => {
                self.metrics.add_write_count(batch.size() as u64);
                self.listeners.after_record_writing(&batch);
                self.listeners.after_batch_writing(&batch);
                None
            }
            Err(error) => {
                self.listeners.on_record_writing_exception(&batch, &error);
                self.listeners.on_batch_writing_exception(&batch, &error);
                if self.parameters.enable_batch_scanning {
                    self.scan_batch(batch)
                } else {
                    self.metrics.add_error_count(batch.size() as u64);
                    error!(
                        "job '{}' could not write a batch: {error}",
                        self.parameters.name
                    );
                    Some(LoopExit::Failed(error))
                }
            }
        }
    }

    /// Re-writes each record of a failed batch as its own singleton batch,
    /// in insertion order, to isolate the poison records. The failed batch
    /// itself accounts for one error; each failing singleton adds another.
    /// Scanning never recurses.
    fn scan_batch(&mut self, batch: Batch<O>) -> Option<LoopExit> {
        let total = self.metrics.add_error_count(1);
        if total > self.parameters.error_threshold {
            return Some(LoopExit::Failed(BatchError::ErrorThresholdExceeded(total)));
        }
        info!(
            "job '{}' scanning the {} records of a failed batch",
            self.parameters.name,
            batch.size()
        );
        for record in &batch {
            record.header().mark_scanned();
        }
        for record in batch.into_records() {
            if self.state.is_abort_requested() {
                return Some(self.aborted());
            }
            let number = record.header().number();
            let singleton = Batch::single(record);
            self.listeners.after_batch_processing(&singleton);
            self.listeners.before_record_writing(&singleton);
            match guarded("record writing", || self.writer.write(&singleton)) {
                Ok(()) => {
                    self.metrics.add_write_count(1);
                    self.listeners.after_record_writing(&singleton);
                    self.listeners.after_batch_writing(&singleton);
                }
                Err(error) => {
                    warn!("record {number} could not be re-written: {error}");
                    self.listeners.on_record_writing_exception(&singleton, &error);
                    self.listeners.on_batch_writing_exception(&singleton, &error);
                    let total = self.metrics.add_error_count(1);
                    if total > self.parameters.error_threshold {
                        return Some(LoopExit::Failed(BatchError::ErrorThresholdExceeded(total)));
                    }
                }
            }
        }
        None
    }

    /// Closes the reader then the writer, each exactly once. A close
    /// failure is logged and recorded as the job's last error only when no
    /// earlier error was; it never prevents the peer from being closed.
    fn release_resources(&mut self, last_error: &mut Option<BatchError>) {
        if let Err(error) = guarded("reader close", || self.reader.close()) {
            error!(
                "job '{}' could not close its reader: {error}",
                self.parameters.name
            );
            last_error.get_or_insert(error);
        }
        if let Err(error) = guarded("writer close", || self.writer.close()) {
            error!(
                "job '{}' could not close its writer: {error}",
                self.parameters.name
            );
            last_error.get_or_insert(error);
        }
    }

    fn aborted(&self) -> LoopExit {
        info!(
            "job '{}' observed an abort request, draining",
            self.parameters.name
        );
        LoopExit::Aborted
    }
}

/// Runs a fallible component call, converting a panic into a
/// [`BatchError::Panic`] so nothing unwinds out of the batch loop.
fn guarded<T>(
    what: &str,
    call: impl FnOnce() -> Result<T, BatchError>,
) -> Result<T, BatchError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(BatchError::Panic(format!(
            "{what}: {}",
            describe_panic(payload.as_ref())
        ))),
    }
}

/// Builder assembling a [`BatchJob`].
///
/// Stages are applied in registration order. `processor` changes the
/// builder's output type, so processors must be registered before the
/// writer and before batch, writer and pipeline listeners.
pub struct JobBuilder<I, O> {
    parameters: JobParameters,
    reader: Option<Box<dyn RecordReader<I> + Send>>,
    writer: Option<Box<dyn RecordWriter<O> + Send>>,
    pipeline: Pipeline<I, O>,
    listeners: ListenerHub<I, O>,
}

impl<I: 'static> JobBuilder<I, I> {
    pub fn new() -> Self {
        JobBuilder {
            parameters: JobParameters::default(),
            reader: None,
            writer: None,
            pipeline: Pipeline::identity(),
            listeners: ListenerHub::new(),
        }
    }
}

impl<I: 'static> Default for JobBuilder<I, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: 'static, O: 'static> JobBuilder<I, O> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.parameters.name = name.into();
        self
    }

    /// Panics if `batch_size` is zero.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size >= 1, "batch size must be at least 1");
        self.parameters.batch_size = batch_size;
        self
    }

    /// Maximum tolerated error count; one more fails the job.
    pub fn error_threshold(mut self, error_threshold: u64) -> Self {
        self.parameters.error_threshold = error_threshold;
        self
    }

    pub fn enable_monitoring(mut self, enabled: bool) -> Self {
        self.parameters.enable_monitoring = enabled;
        self
    }

    pub fn enable_batch_scanning(mut self, enabled: bool) -> Self {
        self.parameters.enable_batch_scanning = enabled;
        self
    }

    /// Data source; defaults to an empty in-memory source.
    pub fn reader(mut self, reader: impl RecordReader<I> + Send + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Data sink; defaults to a sink that discards every batch.
    pub fn writer(mut self, writer: impl RecordWriter<O> + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn filter(mut self, filter: impl RecordFilter<O> + Send + 'static) -> Self {
        self.pipeline = self.pipeline.add_filter(Box::new(filter));
        self
    }

    pub fn validator(mut self, validator: impl RecordValidator<O> + Send + 'static) -> Self {
        self.pipeline = self.pipeline.add_validator(Box::new(validator));
        self
    }

    /// Appends a processor, changing the output type of the job.
    ///
    /// Panics if the writer or an output-typed listener was already
    /// registered; register processors first.
    pub fn processor<T: 'static>(
        self,
        processor: impl RecordProcessor<O, T> + Send + 'static,
    ) -> JobBuilder<I, T> {
        assert!(
            self.writer.is_none(),
            "processors must be registered before the writer"
        );
        let listeners = match self.listeners.retype() {
            Ok(listeners) => listeners,
            Err(message) => panic!("{message}"),
        };
        JobBuilder {
            parameters: self.parameters,
            reader: self.reader,
            writer: None,
            pipeline: self.pipeline.add_processor(Box::new(processor)),
            listeners,
        }
    }

    pub fn job_listener(mut self, listener: impl JobListener + Send + 'static) -> Self {
        self.listeners.add_job_listener(Box::new(listener));
        self
    }

    pub fn batch_listener(mut self, listener: impl BatchListener<O> + Send + 'static) -> Self {
        self.listeners.add_batch_listener(Box::new(listener));
        self
    }

    pub fn reader_listener(
        mut self,
        listener: impl RecordReaderListener<I> + Send + 'static,
    ) -> Self {
        self.listeners.add_reader_listener(Box::new(listener));
        self
    }

    pub fn writer_listener(
        mut self,
        listener: impl RecordWriterListener<O> + Send + 'static,
    ) -> Self {
        self.listeners.add_writer_listener(Box::new(listener));
        self
    }

    pub fn pipeline_listener(
        mut self,
        listener: impl PipelineListener<I, O> + Send + 'static,
    ) -> Self {
        self.listeners.add_pipeline_listener(Box::new(listener));
        self
    }

    pub fn build(self) -> BatchJob<I, O>
    where
        I: Send,
        O: Send,
    {
        BatchJob {
            id: Uuid::new_v4(),
            parameters: self.parameters,
            reader: self
                .reader
                .unwrap_or_else(|| Box::new(IterableRecordReader::new(Vec::<I>::new()))),
            writer: self.writer.unwrap_or_else(|| Box::new(NoOpRecordWriter::new())),
            pipeline: self.pipeline,
            listeners: self.listeners,
            metrics: Arc::new(JobMetrics::new()),
            state: Arc::new(RunState::new()),
        }
    }
}
