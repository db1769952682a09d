use camino::Utf8PathBuf;
use tracing::debug;

use crate::error::BapError;
use crate::store::Store;

type Lookup = fn(&Store) -> Option<Vec<Utf8PathBuf>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Contigs,
    ReadsOrContigs,
    AnyReadsOrContigs,
}

impl Chain {
    fn lookups(self) -> Vec<Lookup> {
        match self {
            Chain::Contigs => vec![user_contigs, assembled_contigs],
            Chain::ReadsOrContigs => [vec![illumina_reads as Lookup], Chain::Contigs.lookups()].concat(),
            Chain::AnyReadsOrContigs => [
                vec![illumina_reads as Lookup, nanopore_reads],
                Chain::Contigs.lookups(),
            ]
            .concat(),
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            Chain::Contigs => "no contigs file was provided or produced",
            Chain::ReadsOrContigs => "no Illumina reads or contigs files were provided",
            Chain::AnyReadsOrContigs => "no reads files or contigs files were provided",
        }
    }

    pub fn resolve(
        self,
        store: &Store,
        default: Option<Vec<Utf8PathBuf>>,
    ) -> Result<Vec<Utf8PathBuf>, BapError> {
        let found = self.lookups().into_iter().find_map(|lookup| lookup(store));
        match found.or(default) {
            Some(paths) => {
                debug!(chain = ?self, ?paths, "resolved inputs");
                Ok(paths)
            }
            None => Err(BapError::user(self.missing_message())),
        }
    }
}

pub fn contigs_path(store: &Store) -> Result<Utf8PathBuf, BapError> {
    Chain::Contigs
        .resolve(store, None)?
        .into_iter()
        .next()
        .ok_or_else(|| BapError::user(Chain::Contigs.missing_message()))
}

pub fn reads_or_contigs_paths(store: &Store) -> Result<Vec<Utf8PathBuf>, BapError> {
    Chain::ReadsOrContigs.resolve(store, None)
}

pub fn any_reads_or_contigs_paths(store: &Store) -> Result<Vec<Utf8PathBuf>, BapError> {
    Chain::AnyReadsOrContigs.resolve(store, None)
}

fn user_contigs(store: &Store) -> Option<Vec<Utf8PathBuf>> {
    store.user_contigs_path().map(|p| vec![p])
}

fn assembled_contigs(store: &Store) -> Option<Vec<Utf8PathBuf>> {
    store.assembled_contigs_path().map(|p| vec![p])
}

fn illumina_reads(store: &Store) -> Option<Vec<Utf8PathBuf>> {
    Some(store.illumina_paths()).filter(|paths| !paths.is_empty())
}

fn nanopore_reads(store: &Store) -> Option<Vec<Utf8PathBuf>> {
    store.nanopore_path().map(|p| vec![p])
}
