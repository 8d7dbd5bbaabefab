pub mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::Result;
use batchflow::{
    core::{
        job::{Job, JobBuilder},
        listener::{BatchListener, RecordWriterListener},
        pipeline::{RecordProcessor, StageResult},
        record::{Batch, Record},
        report::JobStatus,
    },
    error::BatchError,
    item::IterableRecordReader,
};
use common::{SavingWriter, TrackedReader, TrackedWriter};

struct AlwaysFailingProcessor;

impl RecordProcessor<i32, i32> for AlwaysFailingProcessor {
    fn process(&mut self, _record: Record<i32>) -> StageResult<i32> {
        Err(BatchError::Processing("corrupted payload".to_string()))
    }
}

/// Exceeding the error threshold fails the job, but only strictly: the
/// first error equals the threshold of 1 and is tolerated, the second one
/// exceeds it.
#[test]
fn exceeding_the_error_threshold_should_fail_the_job() -> Result<()> {
    let reader = TrackedReader::new(vec![1, 2]);
    let reader_closes = reader.close_count();
    let writer = TrackedWriter::new();
    let writer_closes = writer.close_count();

    let mut job = JobBuilder::new()
        .named("threshold")
        .batch_size(2)
        .error_threshold(1)
        .reader(reader)
        .processor(AlwaysFailingProcessor)
        .writer(writer)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().read_count, 2);
    assert_eq!(report.metrics().error_count, 2);
    assert_eq!(report.metrics().write_count, 0);
    assert_eq!(
        report.last_error(),
        Some(&BatchError::ErrorThresholdExceeded(2))
    );
    assert_eq!(reader_closes.load(Ordering::Relaxed), 1);
    assert_eq!(writer_closes.load(Ordering::Relaxed), 1);
    Ok(())
}

/// Without batch scanning, a failed batch write is fatal: the whole batch
/// counts as errors and both exception listeners fire exactly once.
#[test]
fn write_failure_without_scanning_should_fail_the_job() -> Result<()> {
    struct CountingWriterListener {
        record_exceptions: Arc<AtomicUsize>,
    }

    impl RecordWriterListener<i32> for CountingWriterListener {
        fn on_record_writing_exception(&self, _batch: &Batch<i32>, _error: &BatchError) {
            self.record_exceptions.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct CountingBatchListener {
        batch_exceptions: Arc<AtomicUsize>,
    }

    impl BatchListener<i32> for CountingBatchListener {
        fn on_batch_writing_exception(&self, _batch: &Batch<i32>, _error: &BatchError) {
            self.batch_exceptions.fetch_add(1, Ordering::Relaxed);
        }
    }

    let record_exceptions: Arc<AtomicUsize> = Arc::default();
    let batch_exceptions: Arc<AtomicUsize> = Arc::default();

    let mut job = JobBuilder::new()
        .named("write-failure")
        .batch_size(2)
        .reader(IterableRecordReader::new(vec![1, 2]))
        .writer(SavingWriter::failing_when(|batch| batch.size() >= 2))
        .writer_listener(CountingWriterListener {
            record_exceptions: Arc::clone(&record_exceptions),
        })
        .batch_listener(CountingBatchListener {
            batch_exceptions: Arc::clone(&batch_exceptions),
        })
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().read_count, 2);
    assert_eq!(report.metrics().write_count, 0);
    assert_eq!(report.metrics().error_count, 2);
    assert_eq!(
        report.last_error(),
        Some(&BatchError::Writer("batch rejected".to_string()))
    );
    assert_eq!(record_exceptions.load(Ordering::Relaxed), 1);
    assert_eq!(batch_exceptions.load(Ordering::Relaxed), 1);
    Ok(())
}

/// A read failure is fatal; the records already buffered for the current
/// batch are dropped, and the counts taken so far are kept.
#[test]
fn read_failure_should_drop_the_buffered_batch() -> Result<()> {
    let reader = TrackedReader::new(vec![1, 2, 3, 4]).failing_at_read(3);
    let reader_closes = reader.close_count();
    let writer = SavingWriter::new();
    let batches = writer.log();

    let mut job = JobBuilder::new()
        .named("read-failure")
        .batch_size(4)
        .reader(reader)
        .writer(writer)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().read_count, 2);
    assert_eq!(report.metrics().write_count, 0);
    assert_eq!(report.metrics().error_count, 0);
    assert_eq!(
        report.last_error(),
        Some(&BatchError::Reader("tracked read failure".to_string()))
    );
    assert!(batches.lock().unwrap().is_empty());
    assert_eq!(reader_closes.load(Ordering::Relaxed), 1);
    Ok(())
}

/// A close failure on a successful run is logged and recorded as the last
/// error, but does not change the outcome.
#[test]
fn close_failure_should_be_recorded_only_when_no_earlier_error_exists() -> Result<()> {
    let writer = TrackedWriter::new().failing_on_close();
    let writer_closes = writer.close_count();

    let mut job = JobBuilder::new()
        .named("close-failure")
        .batch_size(2)
        .reader(IterableRecordReader::new(vec![1, 2]))
        .writer(writer)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().write_count, 2);
    assert_eq!(
        report.last_error(),
        Some(&BatchError::Writer("tracked close failure".to_string()))
    );
    assert_eq!(writer_closes.load(Ordering::Relaxed), 1);
    Ok(())
}

/// A panicking stage is caught and counted like any other record error;
/// the run carries on.
#[test]
fn panicking_processor_should_count_as_a_record_error() -> Result<()> {
    struct PanicsOnTwo;

    impl RecordProcessor<i32, i32> for PanicsOnTwo {
        fn process(&mut self, record: Record<i32>) -> StageResult<i32> {
            if *record.payload() == 2 {
                panic!("cannot process this payload");
            }
            Ok(Some(record))
        }
    }

    let writer = SavingWriter::new();
    let batches = writer.log();

    let mut job = JobBuilder::new()
        .named("panic-capture")
        .batch_size(3)
        .reader(IterableRecordReader::new(vec![1, 2, 3]))
        .processor(PanicsOnTwo)
        .writer(writer)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count, 3);
    assert_eq!(report.metrics().error_count, 1);
    assert_eq!(report.metrics().write_count, 2);
    assert!(report.last_error().is_none());

    let written: Vec<i32> = batches.lock().unwrap()[0]
        .iter()
        .map(|r| *r.payload())
        .collect();
    assert_eq!(written, vec![1, 3]);
    Ok(())
}
