use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use serde_json::json;

use crate::adapters::speciesfinder::find_db;
use crate::domain::JobSpec;
use crate::error::BapError;
use crate::scheduler::Job;
use crate::service::{Context, Service};
use crate::task::{Collector, Execution, Invocation};

pub const VERSION: &str = "1.2.0";

const MAX_CPU: u32 = 1;
const MAX_MEM: u32 = 1;
const MAX_TIM: u64 = 60;

#[derive(Debug, Clone, Copy, Default)]
pub struct GetReference;

impl Service for GetReference {
    fn shim(&self) -> &'static str {
        "GetReference"
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn prepare(&self, ctx: &Context<'_>) -> Result<Invocation, BapError> {
        let Some(closest) = ctx.store().closest_reference() else {
            return Err(BapError::Skip("no closest reference accession was found".to_string()));
        };

        let scheme = ctx.user_input("sf_s")?;
        let (kma_db, _tax) = find_db(&ctx.db_path("speciesfinder")?, &scheme)?;

        let out_file = format!("{}.fna", closest.accession);
        let args = vec![
            "--out-file".to_string(),
            out_file.clone(),
            kma_db.to_string(),
            closest.accession,
        ];

        Ok(Invocation {
            job_name: "kma-retrieve".to_string(),
            label: "Reference".to_string(),
            spec: JobSpec::new("kma-retrieve", args, MAX_CPU, MAX_MEM, MAX_TIM),
            collector: Box::new(ReferenceCollector { out_file }),
        })
    }
}

struct ReferenceCollector {
    out_file: String,
}

impl Collector for ReferenceCollector {
    fn collect(&mut self, execution: &mut Execution, job: &dyn Job) -> Result<(), BapError> {
        let path = job.file_path(&self.out_file);
        if !path.as_std_path().is_file() {
            execution.fail(format!("backend job produced no output, check: {}", job.file_path("")));
            return Ok(());
        }

        let length = genome_length(&path)?;
        execution.store_results(json!({
            "fasta_file": path.as_str(),
            "genome_length": length,
        }));

        let store = execution.store();
        store.put_closest_reference_path(&path);
        store.put_closest_reference_length(length);
        Ok(())
    }
}

pub fn genome_length(path: &Utf8Path) -> Result<u64, BapError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| BapError::Filesystem(format!("open {path}: {err}")))?;
    let mut length = 0u64;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| BapError::Filesystem(format!("read {path}: {err}")))?;
        if !line.starts_with('>') {
            length += line.trim().len() as u64;
        }
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn genome_length_skips_headers() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("ref.fna")).unwrap();
        std::fs::write(&path, ">chr1 test\nACGT\nAC\n>plasmid\nGGG\n").unwrap();
        assert_eq!(genome_length(&path).unwrap(), 9);
    }
}
