use camino::Utf8PathBuf;
use chrono::Local;
use serde_json::{Value, json};

use crate::domain::{elapsed_secs, iso_seconds};
use crate::store::Store;

const RUN_INFO: &str = "bap/run_info";
const USER_INPUTS: &str = "bap/user_inputs";
const SUMMARY: &str = "bap/summary";

#[derive(Debug, Clone, PartialEq)]
pub struct ClosestReference {
    pub accession: String,
    pub name: Option<String>,
    pub path: Option<Utf8PathBuf>,
    pub length: Option<u64>,
}

impl Store {
    pub fn start_run(&self, service: &str, version: &str, user_inputs: Value) {
        self.put(&format!("{RUN_INFO}/service"), service);
        self.put(&format!("{RUN_INFO}/version"), version);
        self.put(&format!("{RUN_INFO}/time/start"), iso_seconds(&Local::now()));
        self.put(USER_INPUTS, user_inputs);
    }

    pub fn end_run(&self, status: &str) {
        let now = Local::now();
        if let Some(start) = self.get_str(&format!("{RUN_INFO}/time/start")) {
            if let Some(secs) = elapsed_secs(&start, &now) {
                self.put(&format!("{RUN_INFO}/time/duration"), secs);
            }
        }
        self.put(&format!("{RUN_INFO}/time/end"), iso_seconds(&now));
        self.put(&format!("{RUN_INFO}/status"), status);
    }

    pub fn put_user_input(&self, param: &str, value: impl Into<Value>) {
        self.put(&format!("{USER_INPUTS}/{param}"), value);
    }

    pub fn user_input(&self, param: &str) -> Option<Value> {
        self.get(&format!("{USER_INPUTS}/{param}"))
    }

    pub fn add_run_warning(&self, warning: &str) {
        self.append("bap/warnings", warning, false);
    }

    pub fn put_db_root(&self, path: &Utf8PathBuf) {
        self.put_user_input("db_root", path.as_str());
    }

    pub fn db_root(&self) -> Option<Utf8PathBuf> {
        self.get_str(&format!("{USER_INPUTS}/db_root"))
            .map(Utf8PathBuf::from)
    }

    pub fn put_sample_id(&self, id: &str) {
        self.put(&format!("{SUMMARY}/sample_id"), id);
    }

    pub fn sample_id(&self) -> String {
        self.get_str(&format!("{SUMMARY}/sample_id"))
            .unwrap_or_else(|| "unknown".to_string())
    }

    // Sequence inputs

    pub fn put_user_contigs_path(&self, path: &Utf8PathBuf) {
        self.put_user_input("contigs", path.as_str());
    }

    pub fn user_contigs_path(&self) -> Option<Utf8PathBuf> {
        self.get_str(&format!("{USER_INPUTS}/contigs"))
            .map(Utf8PathBuf::from)
    }

    pub fn put_assembled_contigs_path(&self, path: &Utf8PathBuf) {
        self.put(&format!("{SUMMARY}/contigs"), path.as_str());
    }

    pub fn assembled_contigs_path(&self) -> Option<Utf8PathBuf> {
        self.get_str(&format!("{SUMMARY}/contigs"))
            .map(Utf8PathBuf::from)
    }

    pub fn put_illumina_paths(&self, paths: &[Utf8PathBuf]) {
        let paths: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
        self.put_user_input("illumina_fqs", json!(paths));
    }

    pub fn illumina_paths(&self) -> Vec<Utf8PathBuf> {
        self.get_strings(&format!("{USER_INPUTS}/illumina_fqs"))
            .into_iter()
            .map(Utf8PathBuf::from)
            .collect()
    }

    pub fn put_nanopore_path(&self, path: &Utf8PathBuf) {
        self.put_user_input("nano_fq", path.as_str());
    }

    pub fn nanopore_path(&self) -> Option<Utf8PathBuf> {
        self.get_str(&format!("{USER_INPUTS}/nano_fq"))
            .map(Utf8PathBuf::from)
    }

    // Species

    pub fn put_user_species(&self, species: &[String]) {
        self.put_user_input("species", json!(species));
    }

    pub fn add_detected_species(&self, species: &str) {
        self.append(&format!("{SUMMARY}/species"), species, true);
    }

    pub fn detected_species(&self) -> Vec<String> {
        self.get_strings(&format!("{SUMMARY}/species"))
    }

    pub fn species(&self) -> Vec<String> {
        let mut all = self.get_strings(&format!("{USER_INPUTS}/species"));
        all.extend(self.detected_species());
        all
    }

    // Reference. `closest` is a single-writer slot, not a union: SpeciesFinder
    // sets the accession and name, then GetReference adds path and length.

    pub fn put_closest_reference(&self, accession: &str, name: &str) {
        self.put(&format!("{SUMMARY}/closest/accession"), accession);
        self.put(&format!("{SUMMARY}/closest/name"), name);
    }

    pub fn put_closest_reference_path(&self, path: &Utf8PathBuf) {
        self.put(&format!("{SUMMARY}/closest/path"), path.as_str());
    }

    pub fn put_closest_reference_length(&self, length: u64) {
        self.put(&format!("{SUMMARY}/closest/length"), length);
    }

    pub fn closest_reference(&self) -> Option<ClosestReference> {
        let accession = self
            .get_str(&format!("{SUMMARY}/closest/accession"))
            .filter(|acc| !acc.is_empty())?;
        Some(ClosestReference {
            accession,
            name: self.get_str(&format!("{SUMMARY}/closest/name")),
            path: self
                .get_str(&format!("{SUMMARY}/closest/path"))
                .map(Utf8PathBuf::from),
            length: self
                .get(&format!("{SUMMARY}/closest/length"))
                .and_then(|v| v.as_u64()),
        })
    }

    // Plasmids

    pub fn put_user_plasmids(&self, plasmids: &[String]) {
        self.put_user_input("plasmids", json!(plasmids));
    }

    pub fn add_detected_plasmid(&self, plasmid: &str) {
        self.append(&format!("{SUMMARY}/plasmids"), plasmid, true);
    }

    pub fn detected_plasmids(&self) -> Vec<String> {
        let mut plasmids = self.get_strings(&format!("{SUMMARY}/plasmids"));
        plasmids.sort();
        plasmids
    }

    pub fn plasmids(&self) -> Vec<String> {
        let mut all = self.get_strings(&format!("{USER_INPUTS}/plasmids"));
        all.sort();
        all.extend(self.detected_plasmids());
        all
    }

    // Virulence

    pub fn add_detected_virulence_gene(&self, gene: &str) {
        self.append(&format!("{SUMMARY}/virulence_genes"), gene, true);
    }

    pub fn virulence_genes(&self) -> Vec<String> {
        let mut genes = self.get_strings(&format!("{SUMMARY}/virulence_genes"));
        genes.sort();
        genes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_reference_requires_accession() {
        let store = Store::new();
        assert_eq!(store.closest_reference(), None);

        store.put_closest_reference("NZ_CP009072.1", "Escherichia coli ATCC 25922");
        store.put_closest_reference_length(5_130_767);
        let closest = store.closest_reference().unwrap();
        assert_eq!(closest.accession, "NZ_CP009072.1");
        assert_eq!(closest.length, Some(5_130_767));
        assert_eq!(closest.path, None);
    }

    #[test]
    fn closest_reference_is_filled_in_two_steps() {
        let store = Store::new();
        store.put_closest_reference("NZ_CP009072.1", "Escherichia coli ATCC 25922");
        store.put_closest_reference_path(&"/work/kma-retrieve/NZ_CP009072.1.fna".into());
        store.put_closest_reference_length(5_130_767);

        assert_eq!(
            store.closest_reference(),
            Some(ClosestReference {
                accession: "NZ_CP009072.1".to_string(),
                name: Some("Escherichia coli ATCC 25922".to_string()),
                path: Some("/work/kma-retrieve/NZ_CP009072.1.fna".into()),
                length: Some(5_130_767),
            })
        );
        assert_eq!(
            store.get("bap/summary/closest/accession"),
            Some(json!("NZ_CP009072.1"))
        );
    }

    #[test]
    fn species_lists_user_before_detected() {
        let store = Store::new();
        store.put_user_species(&["Escherichia coli".to_string()]);
        store.add_detected_species("Shigella sonnei");
        store.add_detected_species("Shigella sonnei");
        assert_eq!(
            store.species(),
            vec!["Escherichia coli".to_string(), "Shigella sonnei".to_string()]
        );
    }

    #[test]
    fn run_info_is_stamped() {
        let store = Store::new();
        store.start_run("kira-bap", "0.1.0", serde_json::json!({}));
        store.end_run("COMPLETED");
        assert!(store.contains("bap/run_info/time/start"));
        assert!(store.contains("bap/run_info/time/end"));
        assert!(store.get("bap/run_info/time/duration").unwrap().is_number());
        assert_eq!(
            store.get_str("bap/run_info/status").as_deref(),
            Some("COMPLETED")
        );
    }
}
