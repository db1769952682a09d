use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use regex::Regex;
use tracing::debug;

use crate::error::BapError;
use crate::store::Store;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// CASAVA 1.8 header: `@<instrument>:<run>:<flowcell>:<lane>:<tile>:<x>:<y> <read>:<filtered>:<control>:<index>`.
const ILLUMINA_HEADER: &str = r"^@.+?(:.+?){2}(:\d+?){4} [12]:[YN]:\d+:[^: ]+( .*)?$";
const NANOPORE_HEADER: &str = r"^@[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}.*$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Fasta,
    Fastq,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadsKind {
    Illumina,
    Nanopore,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFiles {
    pub contigs: Option<Utf8PathBuf>,
    pub illumina: Vec<Utf8PathBuf>,
    pub nanopore: Option<Utf8PathBuf>,
}

impl InputFiles {
    pub fn classify(paths: &[Utf8PathBuf]) -> Result<Self, BapError> {
        let mut inputs = InputFiles::default();

        for path in paths {
            if !path.as_std_path().is_file() {
                return Err(BapError::user(format!("no such file: {path}")));
            }
            match detect_filetype(path)? {
                FileKind::Fasta => {
                    if inputs.contigs.is_some() {
                        return Err(BapError::user(format!("more than one FASTA file passed: {path}")));
                    }
                    inputs.contigs = Some(path.clone());
                }
                FileKind::Fastq => match detect_reads(path)? {
                    Some(ReadsKind::Illumina) => inputs.illumina.push(path.clone()),
                    Some(ReadsKind::Nanopore) => {
                        if inputs.nanopore.is_some() {
                            return Err(BapError::user(format!(
                                "more than one Nanopore fastq file passed: {path}"
                            )));
                        }
                        inputs.nanopore = Some(path.clone());
                    }
                    None => {
                        return Err(BapError::user(format!(
                            "cannot detect whether file has Illumina or Nanopore reads: {path}"
                        )));
                    }
                },
                FileKind::Other => {
                    return Err(BapError::user(format!("file is neither FASTA nor fastq: {path}")));
                }
            }
        }

        inputs.validate()?;
        debug!(?inputs, "classified input files");
        Ok(inputs)
    }

    fn validate(&self) -> Result<(), BapError> {
        if self.illumina.len() > 2 {
            return Err(BapError::user("more than two Illumina fastq files passed"));
        }
        if !self.illumina.is_empty() && self.nanopore.is_some() {
            return Err(BapError::user("pass either Illumina or Nanopore reads, not both"));
        }
        if self.contigs.is_some() && (!self.illumina.is_empty() || self.nanopore.is_some()) {
            return Err(BapError::user("pass either FASTQ or FASTA files, not both"));
        }
        if self.contigs.is_none() && self.illumina.is_empty() && self.nanopore.is_none() {
            return Err(BapError::user("no input files were provided"));
        }
        Ok(())
    }

    pub fn seed(&self, store: &Store) {
        if let Some(contigs) = &self.contigs {
            store.put_user_contigs_path(contigs);
        }
        if !self.illumina.is_empty() {
            store.put_illumina_paths(&self.illumina);
        }
        if let Some(nanopore) = &self.nanopore {
            store.put_nanopore_path(nanopore);
        }
    }
}

pub fn detect_filetype(path: &Utf8Path) -> Result<FileKind, BapError> {
    let mut reader = open_text(path)?;
    let head = reader
        .fill_buf()
        .map_err(|err| BapError::Filesystem(format!("read {path}: {err}")))?;
    Ok(match head.first() {
        Some(b'>') => FileKind::Fasta,
        Some(b'@') => FileKind::Fastq,
        _ => FileKind::Other,
    })
}

pub fn detect_reads(path: &Utf8Path) -> Result<Option<ReadsKind>, BapError> {
    let header = first_line(path)?;
    if pattern(ILLUMINA_HEADER)?.is_match(&header) {
        Ok(Some(ReadsKind::Illumina))
    } else if pattern(NANOPORE_HEADER)?.is_match(&header) {
        Ok(Some(ReadsKind::Nanopore))
    } else {
        Ok(None)
    }
}

fn first_line(path: &Utf8Path) -> Result<String, BapError> {
    let mut line = String::new();
    open_text(path)?
        .read_line(&mut line)
        .map_err(|err| BapError::Filesystem(format!("read {path}: {err}")))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn open_text(path: &Utf8Path) -> Result<Box<dyn BufRead>, BapError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| BapError::Filesystem(format!("open {path}: {err}")))?;
    let mut reader = BufReader::new(file);
    let gzipped = reader
        .fill_buf()
        .map_err(|err| BapError::Filesystem(format!("read {path}: {err}")))?
        .starts_with(&GZIP_MAGIC);
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

fn pattern(re: &str) -> Result<Regex, BapError> {
    Regex::new(re).map_err(|err| BapError::Internal(format!("invalid header pattern: {err}")))
}
