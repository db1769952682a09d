use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{ServiceId, TaskState};
use crate::registry::ServiceRegistry;
use crate::scheduler::Scheduler;
use crate::service::Outcome;
use crate::store::Store;
use crate::task::Task;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub done: Vec<ServiceId>,
    pub failed: Vec<(ServiceId, String)>,
    pub skipped: Vec<(ServiceId, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn status(&self) -> &'static str {
        if self.is_success() { "COMPLETED" } else { "FAILED" }
    }
}

pub struct Runner<'a> {
    registry: &'a ServiceRegistry,
    scheduler: &'a dyn Scheduler,
    poll: Duration,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a ServiceRegistry, scheduler: &'a dyn Scheduler, poll: Duration) -> Self {
        Self {
            registry,
            scheduler,
            poll,
        }
    }

    pub fn run(&self, services: &[ServiceId], store: &Store) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut pending = services.to_vec();

        while !pending.is_empty() {
            let mut tasks: Vec<(ServiceId, Task)> = Vec::new();
            let mut skipped: Vec<(ServiceId, String)> = Vec::new();

            for id in pending.drain(..) {
                match self.registry.execute(id, store, self.scheduler) {
                    Outcome::Skipped(reason) => skipped.push((id, reason)),
                    Outcome::Started(task) | Outcome::Rejected(task) => tasks.push((id, task)),
                }
            }

            self.wait(&mut tasks);

            let mut completed = 0;
            for (id, task) in tasks {
                match task.state() {
                    TaskState::Done => {
                        completed += 1;
                        summary.done.push(id);
                    }
                    _ => summary
                        .failed
                        .push((id, task.error().unwrap_or("unknown error").to_string())),
                }
            }

            if completed == 0 {
                summary.skipped.extend(skipped);
            } else {
                debug!(retry = skipped.len(), "retrying skipped services");
                pending = skipped.into_iter().map(|(id, _)| id).collect();
            }
        }

        info!(
            done = summary.done.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "run finished"
        );
        summary
    }

    fn wait(&self, tasks: &mut [(ServiceId, Task)]) {
        loop {
            let mut running = 0;
            for (_, task) in tasks.iter_mut() {
                if !task.report().is_terminal() {
                    running += 1;
                }
            }
            if running == 0 {
                return;
            }
            debug!(running, "waiting for backend jobs");
            thread::sleep(self.poll);
        }
    }
}
