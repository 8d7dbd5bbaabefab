use std::{
    sync::{Arc, Condvar, Mutex},
    thread,
    time::Duration,
};

use log::info;

use crate::{
    core::{
        job::Job,
        report::{AbortHandle, JobReport},
    },
    error::{describe_panic, BatchError},
};

/// Executes batch jobs, synchronously or on dedicated worker threads.
///
/// `submit` spawns one worker thread per job, so capacity grows with
/// demand. Jobs are independent: cancelling one through its handle never
/// affects its siblings.
pub struct JobExecutor {
    in_flight: Arc<InFlight>,
}

struct InFlight {
    active: Mutex<usize>,
    all_done: Condvar,
}

impl JobExecutor {
    pub fn new() -> Self {
        JobExecutor {
            in_flight: Arc::new(InFlight {
                active: Mutex::new(0),
                all_done: Condvar::new(),
            }),
        }
    }

    /// Runs the job on the calling thread and returns its report.
    pub fn execute(&self, job: &mut dyn Job) -> JobReport {
        job.run()
    }

    /// Runs the job on a dedicated worker thread.
    ///
    /// The returned handle retrieves the report and carries the job's
    /// abort handle.
    pub fn submit(&self, mut job: Box<dyn Job + Send>) -> JobHandle {
        let job_name = job.name().to_string();
        let abort = job.abort_handle();

        // Counted before the spawn so a submit immediately followed by
        // await_termination cannot miss the job.
        *self.in_flight.active.lock().unwrap() += 1;

        let in_flight = Arc::clone(&self.in_flight);
        let thread = thread::Builder::new()
            .name(format!("batch-job-{job_name}"))
            .spawn(move || {
                let report = job.run();
                let mut active = in_flight.active.lock().unwrap();
                *active -= 1;
                in_flight.all_done.notify_all();
                report
            })
            .expect("failed to spawn a job worker thread");

        info!("job '{job_name}' submitted");
        JobHandle {
            job_name,
            abort,
            thread,
        }
    }

    /// Waits until every submitted job has finished, or until the timeout
    /// elapses. Returns `true` when no job is left in flight.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let guard = self.in_flight.active.lock().unwrap();
        let (guard, _) = self
            .in_flight
            .all_done
            .wait_timeout_while(guard, timeout, |active| *active > 0)
            .unwrap();
        *guard == 0
    }
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a job submitted to a [`JobExecutor`].
pub struct JobHandle {
    job_name: String,
    abort: AbortHandle,
    thread: thread::JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Requests cancellation of this job only; sibling jobs keep running.
    /// The job still drains, closes its resources and reports `ABORTED`.
    pub fn cancel(&self) {
        info!("cancellation requested for job '{}'", self.job_name);
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the job finishes and returns its report.
    pub fn join(self) -> Result<JobReport, BatchError> {
        self.thread.join().map_err(|payload| {
            BatchError::Panic(format!(
                "job worker thread: {}",
                describe_panic(payload.as_ref())
            ))
        })
    }
}
