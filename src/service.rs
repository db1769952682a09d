use camino::Utf8PathBuf;
use serde_json::Value;
use tracing::info;

use crate::domain::TaskState;
use crate::error::{BapError, ErrorKind};
use crate::findings::ClosestReference;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::task::{Execution, Invocation, Task};

pub trait Service: Send + Sync {
    fn shim(&self) -> &'static str;

    fn version(&self) -> &'static str;

    /// Resolve inputs and build the invocation. Returning a [`BapError::Skip`]
    /// means the service does not apply and no execution is recorded.
    fn prepare(&self, ctx: &Context<'_>) -> Result<Invocation, BapError>;
}

pub struct Context<'a> {
    sid: &'a str,
    store: &'a Store,
}

impl<'a> Context<'a> {
    pub fn new(sid: &'a str, store: &'a Store) -> Self {
        Self { sid, store }
    }

    pub fn sid(&self) -> &str {
        self.sid
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    pub fn user_input(&self, param: &str) -> Result<String, BapError> {
        match self.store.user_input(param) {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            _ => Err(BapError::user(format!(
                "required user input is missing: {param}"
            ))),
        }
    }

    pub fn user_list(&self, param: &str) -> Vec<String> {
        match self.store.user_input(param) {
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn db_path(&self, name: &str) -> Result<Utf8PathBuf, BapError> {
        let root = self
            .store
            .db_root()
            .ok_or_else(|| BapError::Internal("database root path is not set".to_string()))?;
        let path = root.join(name);
        if !path.as_std_path().is_dir() {
            return Err(BapError::user(format!("database path not found: {path}")));
        }
        Ok(path)
    }

    pub fn closest_reference(&self) -> Result<ClosestReference, BapError> {
        self.store
            .closest_reference()
            .ok_or_else(|| BapError::user("no closest reference was determined"))
    }
}

pub enum Outcome {
    Skipped(String),
    Started(Task),
    Rejected(Task),
}

impl Outcome {
    pub fn into_task(self) -> Option<Task> {
        match self {
            Outcome::Skipped(_) => None,
            Outcome::Started(task) | Outcome::Rejected(task) => Some(task),
        }
    }
}

pub fn execute(
    service: &dyn Service,
    sid: &str,
    xid: Option<&str>,
    store: &Store,
    scheduler: &dyn Scheduler,
) -> Outcome {
    let prepared = service.prepare(&Context::new(sid, store));

    if let Err(err) = &prepared {
        if err.kind() == ErrorKind::Skip {
            info!(service = %sid, reason = %err, "service skipped");
            return Outcome::Skipped(err.to_string());
        }
    }

    let execution = Execution::new(service.shim(), service.version(), sid, xid, store.clone());
    let mut task = Task::new(execution);

    let started = prepared.and_then(|invocation| task.start(invocation, scheduler));
    if let Err(err) = started {
        task.execution_mut().fail_with(&err);
    }

    match task.state() {
        TaskState::Failed => Outcome::Rejected(task),
        _ => {
            info!(service = %sid, "service execution started");
            Outcome::Started(task)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

impl Service for Unimplemented {
    fn shim(&self) -> &'static str {
        "unimplemented"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn prepare(&self, ctx: &Context<'_>) -> Result<Invocation, BapError> {
        Err(BapError::user(format!(
            "service {} is not implemented",
            ctx.sid()
        )))
    }
}
