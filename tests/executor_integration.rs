use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::Result;
use batchflow::{
    core::{
        executor::JobExecutor,
        io::{ReadResult, RecordReader},
        job::{Job, JobBuilder},
        listener::BatchListener,
        record::Batch,
        report::{AbortHandle, JobStatus},
    },
    item::{IterableRecordReader, RecordCollector},
};

const SOURCE_SIZE: i32 = 1_000_000;
const HALF: usize = 500_000;

/// Cancels its own job once the first batch has been written.
struct AbortAfterFirstBatch {
    handle: Arc<Mutex<Option<AbortHandle>>>,
}

impl BatchListener<i32> for AbortAfterFirstBatch {
    fn after_batch_writing(&self, _batch: &Batch<i32>) {
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.abort();
        }
    }
}

/// Two jobs over the same million-record source; the first is cancelled
/// after its first batch, the second must not notice.
#[test]
fn cancelling_a_job_should_not_affect_its_siblings() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let collector1 = RecordCollector::new();
    let seen1 = collector1.clone();
    let slot: Arc<Mutex<Option<AbortHandle>>> = Arc::default();

    let job1 = JobBuilder::new()
        .named("job1")
        .batch_size(HALF)
        .reader(IterableRecordReader::new(0..SOURCE_SIZE))
        .processor(collector1)
        .batch_listener(AbortAfterFirstBatch {
            handle: Arc::clone(&slot),
        })
        .build();
    *slot.lock().unwrap() = Some(job1.abort_handle());

    let collector2 = RecordCollector::new();
    let seen2 = collector2.clone();
    let job2 = JobBuilder::new()
        .named("job2")
        .batch_size(HALF)
        .reader(IterableRecordReader::new(0..SOURCE_SIZE))
        .processor(collector2)
        .build();

    let executor = JobExecutor::new();
    let handle1 = executor.submit(Box::new(job1));
    let handle2 = executor.submit(Box::new(job2));

    let report1 = handle1.join().expect("job thread should not panic");
    let report2 = handle2.join().expect("job thread should not panic");

    assert_eq!(report1.status(), JobStatus::Aborted);
    assert!(report1.last_error().is_none());
    assert_eq!(report1.metrics().read_count, HALF as u64);
    assert_eq!(seen1.count(), HALF);

    assert_eq!(report2.status(), JobStatus::Completed);
    assert_eq!(report2.metrics().read_count, SOURCE_SIZE as u64);
    assert_eq!(seen2.count(), SOURCE_SIZE as usize);
    Ok(())
}

/// Reader that yields slowly so tests can observe a job in flight.
struct SlowReader {
    remaining: i32,
    delay: Duration,
}

impl SlowReader {
    fn new(count: i32, delay: Duration) -> Self {
        SlowReader {
            remaining: count,
            delay,
        }
    }
}

impl RecordReader<i32> for SlowReader {
    fn read(&mut self) -> ReadResult<i32> {
        if self.remaining == 0 {
            return Ok(None);
        }
        thread::sleep(self.delay);
        self.remaining -= 1;
        Ok(Some(self.remaining))
    }

    fn source_name(&self) -> &str {
        "slow source"
    }
}

#[test]
fn cancelled_handle_should_abort_only_its_own_job() -> Result<()> {
    let executor = JobExecutor::new();

    let slow_job = JobBuilder::<i32, i32>::new()
        .named("slow")
        .batch_size(100)
        .reader(SlowReader::new(10_000, Duration::from_millis(1)))
        .build();

    let handle = executor.submit(Box::new(slow_job));
    handle.cancel();
    // A second cancel must be harmless.
    handle.cancel();

    let report = handle.join().expect("job thread should not panic");

    assert_eq!(report.status(), JobStatus::Aborted);
    assert!(report.last_error().is_none());
    assert!(report.metrics().read_count < 10_000);
    Ok(())
}

#[test]
fn await_termination_should_time_out_while_a_job_is_in_flight() -> Result<()> {
    let executor = JobExecutor::new();

    let slow_job = JobBuilder::<i32, i32>::new()
        .named("lingering")
        .batch_size(100)
        .reader(SlowReader::new(10_000, Duration::from_millis(2)))
        .build();

    let handle = executor.submit(Box::new(slow_job));

    assert!(!executor.await_termination(Duration::from_millis(50)));

    handle.cancel();
    assert!(executor.await_termination(Duration::from_secs(10)));

    let report = handle.join().expect("job thread should not panic");
    assert_eq!(report.status(), JobStatus::Aborted);
    Ok(())
}
