use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::domain::{JobSpec, JobState, TaskState, iso_seconds};
use crate::error::{BapError, ErrorKind};
use crate::scheduler::{Job, Scheduler};
use crate::store::Store;

const DEFAULT_FAILURE: &str = "backend job failed";

pub struct Execution {
    sid: String,
    xid: Option<String>,
    store: Store,
    state: TaskState,
    error: Option<String>,
    started: DateTime<Local>,
}

impl Execution {
    pub fn new(shim: &str, version: &str, sid: &str, xid: Option<&str>, store: Store) -> Self {
        let mut execution = Self {
            sid: sid.to_string(),
            xid: xid.map(str::to_string),
            store,
            state: TaskState::Started,
            error: None,
            started: Local::now(),
        };
        execution.put_run_info("shim", shim);
        execution.put_run_info("version", version);
        execution.put_run_info("service", sid);
        execution.transition(TaskState::Started, None);
        execution
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn xid(&self) -> Option<&str> {
        self.xid.as_deref()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn get_run_info(&self, path: &str) -> Option<Value> {
        self.store.get(&self.path(&format!("run_info/{path}")))
    }

    pub fn put_run_info(&self, path: &str, value: impl Into<Value>) {
        self.store.put(&self.path(&format!("run_info/{path}")), value);
    }

    pub fn add_warning(&self, warning: &str) {
        self.store.append(&self.path("warnings"), warning, false);
    }

    pub fn add_warnings<I, S>(&self, warnings: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for warning in warnings {
            let warning = warning.as_ref().trim();
            if !warning.is_empty() {
                self.add_warning(warning);
            }
        }
    }

    pub fn add_error(&self, message: &str) {
        self.store.append(&self.path("errors"), message, false);
    }

    pub fn store_job_spec(&self, spec: &JobSpec) -> Result<(), BapError> {
        self.put_run_info("job", serde_json::to_value(spec)?);
        Ok(())
    }

    pub fn store_results(&self, results: impl Into<Value>) {
        self.store.put(&self.path("results"), results);
    }

    pub fn done(&mut self) -> TaskState {
        self.transition(TaskState::Done, None)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> TaskState {
        self.transition(TaskState::Failed, Some(reason.into()))
    }

    pub fn fail_with(&mut self, err: &BapError) -> TaskState {
        match err.kind() {
            ErrorKind::Internal => {
                error!(service = %self.sid, error = ?err, "internal error in service execution");
            }
            ErrorKind::User | ErrorKind::Skip => {
                debug!(service = %self.sid, error = %err, "service execution rejected");
            }
        }
        self.fail(err.to_string())
    }

    fn path(&self, rest: &str) -> String {
        format!("services/{}/{rest}", self.sid)
    }

    fn transition(&mut self, new_state: TaskState, error: Option<String>) -> TaskState {
        if self.state.is_terminal() {
            warn!(
                service = %self.sid,
                from = %self.state,
                to = %new_state,
                "ignoring transition out of terminal state"
            );
            return self.state;
        }

        self.state = new_state;
        self.error = error.filter(|reason| !reason.trim().is_empty());
        if new_state == TaskState::Failed && self.error.is_none() {
            self.error = Some(DEFAULT_FAILURE.to_string());
        }

        let now = Local::now();
        if new_state == TaskState::Started {
            self.started = now;
            self.put_run_info("time/start", iso_seconds(&now));
        } else {
            let duration = (now - self.started).num_milliseconds() as f64 / 1000.0;
            self.put_run_info("time/duration", duration);
            self.put_run_info("time/end", iso_seconds(&now));
        }

        self.put_run_info("status", new_state.as_str());
        if new_state == TaskState::Failed {
            let message = self.error.clone().unwrap_or_default();
            self.add_error(&message);
            info!(service = %self.sid, error = %message, "service execution failed");
        } else if new_state == TaskState::Done {
            info!(service = %self.sid, "service execution done");
        }

        self.state
    }
}

pub trait Collector: Send {
    fn collect(&mut self, execution: &mut Execution, job: &dyn Job) -> Result<(), BapError>;
}

pub struct Invocation {
    pub job_name: String,
    pub label: String,
    pub spec: JobSpec,
    pub collector: Box<dyn Collector>,
}

pub struct Task {
    execution: Execution,
    job: Option<Box<dyn Job>>,
    collector: Option<Box<dyn Collector>>,
}

impl Task {
    pub fn new(execution: Execution) -> Self {
        Self {
            execution,
            job: None,
            collector: None,
        }
    }

    pub fn sid(&self) -> &str {
        self.execution.sid()
    }

    pub fn state(&self) -> TaskState {
        self.execution.state()
    }

    pub fn error(&self) -> Option<&str> {
        self.execution.error()
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn execution_mut(&mut self) -> &mut Execution {
        &mut self.execution
    }

    pub fn start(
        &mut self,
        invocation: Invocation,
        scheduler: &dyn Scheduler,
    ) -> Result<(), BapError> {
        if self.execution.state() != TaskState::Started {
            debug!(service = %self.sid(), "not starting job for terminated execution");
            return Ok(());
        }
        self.execution.store_job_spec(&invocation.spec)?;
        let job = scheduler.schedule_job(&invocation.job_name, &invocation.spec, &invocation.label)?;
        self.job = Some(job);
        self.collector = Some(invocation.collector);
        Ok(())
    }

    /// Poll the backend job and advance the execution. Never blocks, and once
    /// terminal returns the same state without touching the store.
    pub fn report(&mut self) -> TaskState {
        if self.execution.state().is_terminal() {
            return self.execution.state();
        }

        let Some(job) = self.job.as_mut() else {
            let err = BapError::Internal("no backend job was started".to_string());
            return self.execution.fail_with(&err);
        };

        match job.state() {
            JobState::Running => {
                debug!(service = %self.execution.sid(), "backend job still running");
            }
            JobState::Completed => {
                if let Some(mut collector) = self.collector.take() {
                    if let Err(err) = collector.collect(&mut self.execution, &**job) {
                        self.execution.fail_with(&err);
                    }
                }
                if self.execution.state() == TaskState::Started {
                    self.execution.done();
                }
            }
            JobState::Failed => {
                let reason = job.error().unwrap_or_default();
                self.execution.fail(reason);
            }
        }

        self.execution.state()
    }
}
