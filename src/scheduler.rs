use std::fs::{self, File};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::domain::{JobSpec, JobState};
use crate::error::BapError;

pub trait Job: Send {
    fn state(&mut self) -> JobState;
    fn file_path(&self, name: &str) -> Utf8PathBuf;
    fn error(&self) -> Option<String>;
}

pub trait Scheduler {
    fn schedule_job(
        &self,
        name: &str,
        spec: &JobSpec,
        label: &str,
    ) -> Result<Box<dyn Job>, BapError>;
}

#[derive(Debug, Clone)]
pub struct ProcessScheduler {
    work_root: Utf8PathBuf,
}

impl ProcessScheduler {
    pub fn new(work_root: Utf8PathBuf) -> Self {
        Self { work_root }
    }

    pub fn work_root(&self) -> &Utf8Path {
        &self.work_root
    }
}

impl Scheduler for ProcessScheduler {
    fn schedule_job(
        &self,
        name: &str,
        spec: &JobSpec,
        label: &str,
    ) -> Result<Box<dyn Job>, BapError> {
        let dir = self.work_root.join(name);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| BapError::Filesystem(format!("create {dir}: {err}")))?;

        let stdout = File::create(dir.join("stdout.log").as_std_path())
            .map_err(|err| BapError::Filesystem(err.to_string()))?;
        let stderr = File::create(dir.join("stderr.log").as_std_path())
            .map_err(|err| BapError::Filesystem(err.to_string()))?;

        let child = Command::new(&spec.command)
            .args(&spec.args)
            .current_dir(dir.as_std_path())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|err| BapError::Scheduler(format!("cannot start {}: {err}", spec.command)))?;

        info!(job = %name, label, command = %spec.command, "backend job started");

        Ok(Box::new(ProcessJob {
            label: label.to_string(),
            dir,
            child,
            started: Instant::now(),
            limit: (spec.time > 0).then(|| Duration::from_secs(spec.time)),
            state: JobState::Running,
            error: None,
        }))
    }
}

struct ProcessJob {
    label: String,
    dir: Utf8PathBuf,
    child: Child,
    started: Instant,
    limit: Option<Duration>,
    state: JobState,
    error: Option<String>,
}

impl ProcessJob {
    fn finish(&mut self, state: JobState, error: Option<String>) {
        debug!(label = %self.label, ?state, "backend job finished");
        self.state = state;
        self.error = error;
    }

    fn terminate(&mut self) {
        if let Err(err) = self.child.kill() {
            warn!(label = %self.label, error = %err, "failed to kill backend job");
        }
        if let Err(err) = self.child.wait() {
            warn!(label = %self.label, error = %err, "failed to reap backend job");
        }
    }

    fn stderr_tail(&self) -> Option<String> {
        let content = fs::read_to_string(self.dir.join("stderr.log").as_std_path()).ok()?;
        content
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

impl Job for ProcessJob {
    fn state(&mut self) -> JobState {
        if self.state != JobState::Running {
            return self.state;
        }

        match self.child.try_wait() {
            Ok(Some(status)) if status.success() => self.finish(JobState::Completed, None),
            Ok(Some(status)) => {
                let reason = self
                    .stderr_tail()
                    .unwrap_or_else(|| format!("backend exited with {status}"));
                self.finish(JobState::Failed, Some(reason));
            }
            Ok(None) => {
                if let Some(limit) = self.limit.filter(|l| self.started.elapsed() > *l) {
                    warn!(label = %self.label, secs = limit.as_secs(), "backend job over time limit; killing");
                    self.terminate();
                    self.finish(
                        JobState::Failed,
                        Some(format!("backend exceeded time limit of {}s", limit.as_secs())),
                    );
                }
            }
            Err(err) => self.finish(JobState::Failed, Some(err.to_string())),
        }

        self.state
    }

    fn file_path(&self, name: &str) -> Utf8PathBuf {
        if name.is_empty() {
            self.dir.clone()
        } else {
            self.dir.join(name)
        }
    }

    fn error(&self) -> Option<String> {
        self.error.clone()
    }
}

impl Drop for ProcessJob {
    fn drop(&mut self) {
        if self.state == JobState::Running && matches!(self.child.try_wait(), Ok(None)) {
            debug!(label = %self.label, "backend job dropped while running; killing");
            self.terminate();
        }
    }
}
