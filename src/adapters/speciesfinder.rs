use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::adapters::path_args;
use crate::domain::JobSpec;
use crate::error::BapError;
use crate::inputs::Chain;
use crate::scheduler::Job;
use crate::service::{Context, Service};
use crate::task::{Collector, Execution, Invocation};

pub const VERSION: &str = "2.2.0";

const MAX_CPU: u32 = 1;
const MAX_MEM: u32 = 8;
const MAX_TIM: u64 = 10 * 60;

const TAX_COLUMNS: usize = 17;
const RES_COLUMNS: usize = 11;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpeciesFinder;

impl Service for SpeciesFinder {
    fn shim(&self) -> &'static str {
        "SpeciesFinder"
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn prepare(&self, ctx: &Context<'_>) -> Result<Invocation, BapError> {
        let scheme = ctx.user_input("sf_s")?;
        let (db_path, tax_file) = find_db(&ctx.db_path("speciesfinder")?, &scheme)?;
        let inputs = Chain::AnyReadsOrContigs.resolve(ctx.store(), None)?;

        let mut args: Vec<String> = vec!["-db".into(), db_path.to_string(), "-o".into(), ".".into(), "-i".into()];
        args.extend(path_args(&inputs));
        if let Some(tax) = &tax_file {
            args.push("-tax".into());
            args.push(tax.to_string());
        }

        Ok(Invocation {
            job_name: format!("sf_{scheme}"),
            label: format!("SpeciesFinder/{scheme}"),
            spec: JobSpec::new("speciesfinder", args, MAX_CPU, MAX_MEM, MAX_TIM),
            collector: Box::new(SpeciesCollector),
        })
    }
}

pub fn find_db(db_root: &Utf8Path, name: &str) -> Result<(Utf8PathBuf, Option<Utf8PathBuf>), BapError> {
    let Some(seq_file) = seq_files(&db_root.join(name), name).into_iter().next() else {
        return Err(BapError::user(format!(
            "database '{name}' not found; databases are: {}",
            available(db_root).join(", ")
        )));
    };

    let db_path = Utf8PathBuf::from(seq_file.as_str().trim_end_matches(".seq.b"));
    let tax = Utf8PathBuf::from(format!("{db_path}.tax"));
    let tax = tax.as_std_path().is_file().then_some(tax);
    debug!(%db_path, ?tax, "located KMA database");
    Ok((db_path, tax))
}

fn seq_files(dir: &Utf8Path, name: &str) -> Vec<Utf8PathBuf> {
    let Ok(entries) = dir.read_dir_utf8() else {
        return Vec::new();
    };
    let mut files: Vec<Utf8PathBuf> = entries
        .flatten()
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| {
            path.file_name()
                .is_some_and(|file| file.starts_with(name) && file.ends_with(".seq.b"))
        })
        .collect();
    files.sort();
    files
}

fn available(db_root: &Utf8Path) -> Vec<String> {
    let Ok(entries) = db_root.read_dir_utf8() else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.file_name().to_string())
        .filter(|name| !seq_files(&db_root.join(name), name).is_empty())
        .collect();
    names.sort();
    names
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesHit {
    pub accession: String,
    pub desc: String,
    pub score: i64,
    pub expected: i64,
    pub slen: i64,
    pub sident: f64,
    pub scov: f64,
    pub qident: f64,
    pub qcov: f64,
    pub depth: f64,
    pub q_value: f64,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strain_taxid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
}

/// Parse a results table. With taxonomy (`results.txt`) rows have 17
/// columns; without (`results.res`) they have 11 and the first column is
/// the accession followed by its description. The first line is a header.
pub fn parse_results(content: &str, with_tax: bool) -> Result<Vec<SpeciesHit>, String> {
    content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_line(line, with_tax).ok_or_else(|| format!("invalid line in SpeciesFinder results: {line}")))
        .collect()
}

fn parse_line(line: &str, with_tax: bool) -> Option<SpeciesHit> {
    let rec: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let expected = if with_tax { TAX_COLUMNS } else { RES_COLUMNS };
    if rec.len() != expected {
        return None;
    }

    let (accession, desc) = if with_tax {
        (rec[11].trim().to_string(), rec[12].trim().to_string())
    } else {
        let template = rec[0].trim();
        match template.split_once(' ') {
            Some((acc, desc)) => (acc.to_string(), desc.trim().to_string()),
            None => (template.to_string(), String::new()),
        }
    };

    let int = |i: usize| rec[i].trim().parse::<i64>().ok();
    let float = |i: usize| rec[i].trim().parse::<f64>().ok();

    let mut hit = SpeciesHit {
        accession,
        desc,
        score: int(1)?,
        expected: int(2)?,
        slen: int(3)?,
        sident: float(4)?,
        scov: float(5)?,
        qident: float(6)?,
        qcov: float(7)?,
        depth: float(8)?,
        q_value: float(9)?,
        p_value: float(10)?,
        strain_taxid: None,
        lineage: None,
        taxid: None,
        species: None,
    };

    if with_tax {
        hit.strain_taxid = Some(int(13)?);
        hit.lineage = Some(rec[14].split(';').map(|s| s.trim().to_string()).collect());
        hit.taxid = Some(int(15)?);
        hit.species = Some(rec[16].trim().to_string());
    }

    Some(hit)
}

struct SpeciesCollector;

impl Collector for SpeciesCollector {
    fn collect(&mut self, execution: &mut Execution, job: &dyn Job) -> Result<(), BapError> {
        let tax_results = job.file_path("results.txt");
        let res_results = job.file_path("results.res");
        let (path, with_tax) = if tax_results.as_std_path().is_file() {
            (tax_results, true)
        } else if res_results.as_std_path().is_file() {
            (res_results, false)
        } else {
            execution.fail(format!(
                "service ran but no results.txt or results.res file in {}",
                job.file_path("")
            ));
            return Ok(());
        };

        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| BapError::Filesystem(format!("read {path}: {err}")))?;
        let hits = match parse_results(&content, with_tax) {
            Ok(hits) => hits,
            Err(reason) => {
                execution.fail(reason);
                return Ok(());
            }
        };

        execution.store_results(serde_json::to_value(&hits)?);

        let store = execution.store();
        if let Some(top) = hits.first() {
            if let Some(species) = top.species.as_deref().filter(|s| !s.is_empty()) {
                store.add_detected_species(species);
            }
            store.put_closest_reference(&top.accession, &top.desc);
        }
        Ok(())
    }
}
