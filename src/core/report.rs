use std::{
    collections::BTreeMap,
    env, fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use log::debug;
use serde::{Serialize, Serializer};

use crate::{
    core::{job::JobParameters, metrics::JobMetricsSnapshot},
    error::BatchError,
};

/// Status of a job run.
///
/// Transitions: `Starting` → `Started` → (`Completed` | `Failed` |
/// `Aborted`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// The job is initialising its resources.
    Starting,
    /// Resources are open and the batch loop is running.
    Started,
    /// The data source was exhausted without a fatal error.
    Completed,
    /// A fatal error ended the run early.
    Failed,
    /// Cancellation was observed and the run stopped at a batch boundary.
    Aborted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Starting => "STARTING",
            JobStatus::Started => "STARTED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Aborted => "ABORTED",
        };
        f.write_str(label)
    }
}

/// Terminal, immutable summary of one job run.
///
/// A report is produced exactly once per run, after both the reader and the
/// writer have been closed, and the same instance is handed to every
/// `after_job` listener before being returned to the caller.
#[derive(Debug, Serialize)]
pub struct JobReport {
    job_name: String,
    parameters: JobParameters,
    status: JobStatus,
    metrics: JobMetricsSnapshot,
    #[serde(serialize_with = "error_as_string")]
    last_error: Option<BatchError>,
    system_properties: BTreeMap<String, String>,
}

impl JobReport {
    pub(crate) fn new(
        parameters: JobParameters,
        status: JobStatus,
        metrics: JobMetricsSnapshot,
        last_error: Option<BatchError>,
    ) -> Self {
        JobReport {
            job_name: parameters.name.clone(),
            parameters,
            status,
            metrics,
            last_error,
            system_properties: env::vars().collect(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn metrics(&self) -> &JobMetricsSnapshot {
        &self.metrics
    }

    pub fn last_error(&self) -> Option<&BatchError> {
        self.last_error.as_ref()
    }

    /// Process environment captured when the report was built.
    pub fn system_properties(&self) -> &BTreeMap<String, String> {
        &self.system_properties
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job report")?;
        writeln!(f, "  name:     {}", self.job_name)?;
        writeln!(f, "  status:   {}", self.status)?;
        writeln!(f, "  read:     {}", self.metrics.read_count)?;
        writeln!(f, "  filtered: {}", self.metrics.filter_count)?;
        writeln!(f, "  errors:   {}", self.metrics.error_count)?;
        writeln!(f, "  written:  {}", self.metrics.write_count)?;
        if let Some(duration) = self.metrics.duration() {
            writeln!(f, "  duration: {duration:?}")?;
        }
        match &self.last_error {
            Some(error) => writeln!(f, "  last error: {error}"),
            None => writeln!(f, "  last error: none"),
        }
    }
}

fn error_as_string<S: Serializer>(
    error: &Option<BatchError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// State shared between a running job, its abort handle and its monitor.
///
/// The status and last error are written by the job's own loop only; the
/// abort flag may be set from any thread.
#[derive(Debug)]
pub(crate) struct RunState {
    status: Mutex<JobStatus>,
    aborted: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl RunState {
    pub(crate) fn new() -> Self {
        RunState {
            status: Mutex::new(JobStatus::Starting),
            aborted: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        debug!("job status -> {status}");
        *self.status.lock().unwrap() = status;
    }

    pub(crate) fn status(&self) -> JobStatus {
        *self.status.lock().unwrap()
    }

    pub(crate) fn request_abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_abort_requested(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    pub(crate) fn set_last_error(&self, error: &BatchError) {
        *self.last_error.lock().unwrap() = Some(error.to_string());
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

/// Clonable handle requesting cancellation of one running job.
///
/// Aborting is idempotent and best-effort: the loop observes the flag
/// before each read, before each write and between batches, so a batch
/// already in flight may still complete.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    state: Arc<RunState>,
}

impl AbortHandle {
    pub(crate) fn new(state: Arc<RunState>) -> Self {
        AbortHandle { state }
    }

    pub fn abort(&self) {
        self.state.request_abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.is_abort_requested()
    }
}
