use std::fs;

use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::debug;

use crate::adapters::path_args;
use crate::dbconfig::{DbConfig, GroupDatabases};
use crate::domain::JobSpec;
use crate::error::BapError;
use crate::inputs::Chain;
use crate::normalize::{HitSchema, normalize};
use crate::scheduler::Job;
use crate::service::{Context, Service};
use crate::task::{Collector, Execution, Invocation};

const MAX_CPU: u32 = 1;
const MAX_MEM: u32 = 1;
const MAX_TIM: u64 = 10 * 60;

const OUTPUT_FILE: &str = "data.json";

#[derive(Clone, Copy)]
pub struct DatabaseFinder {
    pub shim: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub ident_param: &'static str,
    pub cov_param: &'static str,
    pub search_param: &'static str,
    pub schema: &'static HitSchema,
}

impl Service for DatabaseFinder {
    fn shim(&self) -> &'static str {
        self.shim
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn prepare(&self, ctx: &Context<'_>) -> Result<Invocation, BapError> {
        let db_path = ctx.db_path(self.backend)?;
        let min_ident = ctx.user_input(self.ident_param)?;
        let min_cov = ctx.user_input(self.cov_param)?;
        let search = ctx.user_list(self.search_param);
        let inputs = Chain::ReadsOrContigs.resolve(ctx.store(), None)?;

        let requested = DbConfig::load(&db_path)?.resolve(search.as_slice())?;
        debug!(service = %ctx.sid(), ?requested, "resolved database search");

        let tmp_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", self.backend))
            .tempdir()
            .map_err(|err| BapError::Filesystem(format!("create temporary directory: {err}")))?;

        let mut args: Vec<String> = vec![
            "-q".into(),
            "-j".into(),
            OUTPUT_FILE.into(),
            "-p".into(),
            db_path.to_string(),
            "-t".into(),
            min_ident,
            "-l".into(),
            min_cov,
            "-i".into(),
        ];
        args.extend(path_args(&inputs));
        if !search.is_empty() {
            let databases: Vec<&str> = requested.values().flatten().map(String::as_str).collect();
            args.push("-d".into());
            args.push(databases.join(","));
        }
        args.push("--tmp_dir".into());
        args.push(tmp_dir.path().display().to_string());

        Ok(Invocation {
            job_name: self.backend.to_string(),
            label: self.shim.to_string(),
            spec: JobSpec::new(self.backend, args, MAX_CPU, MAX_MEM, MAX_TIM),
            collector: Box::new(FinderCollector {
                requested,
                schema: self.schema,
                tmp_dir: Some(tmp_dir),
            }),
        })
    }
}

struct FinderCollector {
    requested: GroupDatabases,
    schema: &'static HitSchema,
    tmp_dir: Option<TempDir>,
}

impl Collector for FinderCollector {
    fn collect(&mut self, execution: &mut Execution, job: &dyn Job) -> Result<(), BapError> {
        if let Some(tmp_dir) = self.tmp_dir.take() {
            if let Err(err) = tmp_dir.close() {
                execution.add_warning(&format!("failed to remove temporary directory: {err}"));
            }
        }

        let path = job.file_path(OUTPUT_FILE);
        let raw: Value = fs::read_to_string(path.as_std_path())
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .ok_or_else(|| BapError::user(format!("failed to open or load JSON from file: {path}")))?;

        let groups = normalize(&raw, &self.requested, self.schema, execution.store())?;
        execution.store_results(json!({
            "search": serde_json::to_value(&self.requested)?,
            "groups": serde_json::to_value(&groups)?,
        }));
        Ok(())
    }
}
