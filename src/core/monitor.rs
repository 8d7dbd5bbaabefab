use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use lazy_static::lazy_static;
use log::debug;

use crate::core::{
    metrics::JobMetrics,
    report::{JobStatus, RunState},
};

/// Well-known prefix of the keys under which job monitors are registered.
pub const JOB_MONITOR_KEY: &str = "batchflow:type=JobMonitor";

lazy_static! {
    static ref REGISTRY: Mutex<HashMap<String, JobMonitor>> = Mutex::new(HashMap::new());
}

/// Read-only view over the live status and metrics of a job.
///
/// Monitors sample on demand: attributes are read straight from the
/// job's shared state, tolerate being read mid-batch and always reflect a
/// monotonic view of the counters.
#[derive(Clone)]
pub struct JobMonitor {
    job_name: String,
    metrics: Arc<JobMetrics>,
    state: Arc<RunState>,
}

impl JobMonitor {
    pub(crate) fn new(job_name: String, metrics: Arc<JobMetrics>, state: Arc<RunState>) -> Self {
        JobMonitor {
            job_name,
            metrics,
            state,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn read_count(&self) -> u64 {
        self.metrics.read_count()
    }

    pub fn write_count(&self) -> u64 {
        self.metrics.write_count()
    }

    pub fn filter_count(&self) -> u64 {
        self.metrics.filter_count()
    }

    pub fn error_count(&self) -> u64 {
        self.metrics.error_count()
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.metrics.start_time()
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.metrics.end_time()
    }

    /// String form of the job's last recorded error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.state.last_error()
    }
}

/// Key under which the monitor of `job_name` is registered.
pub fn monitor_key(job_name: &str) -> String {
    format!("{JOB_MONITOR_KEY},name={job_name}")
}

/// Registers a monitor in the process-wide registry. Re-registering a job
/// name replaces the previous entry: the latest run wins.
pub(crate) fn register(monitor: JobMonitor) {
    let key = monitor_key(monitor.job_name());
    debug!("registering job monitor under '{key}'");
    REGISTRY.lock().unwrap().insert(key, monitor);
}

/// Looks up the monitor of a job by name.
pub fn find_monitor(job_name: &str) -> Option<JobMonitor> {
    REGISTRY
        .lock()
        .unwrap()
        .get(&monitor_key(job_name))
        .cloned()
}
