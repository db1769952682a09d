pub mod finder;
pub mod getreference;
pub mod plasmidfinder;
pub mod speciesfinder;
pub mod virulencefinder;

use camino::Utf8PathBuf;

pub(crate) fn path_args(paths: &[Utf8PathBuf]) -> impl Iterator<Item = String> + '_ {
    paths.iter().map(|p| p.as_str().to_string())
}
