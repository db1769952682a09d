use camino::Utf8PathBuf;
use serde_json::json;

use kira_bap::store::Store;

#[test]
fn summary_writes_are_unions() {
    let store = Store::new();
    let other = store.clone();

    store.add_detected_plasmid("IncFII");
    other.add_detected_plasmid("Col156");
    store.add_detected_plasmid("IncFII");

    assert_eq!(
        store.detected_plasmids(),
        vec!["Col156".to_string(), "IncFII".to_string()]
    );
}

#[test]
fn user_declared_values_come_first() {
    let store = Store::new();
    store.add_detected_species("Escherichia coli");
    store.put_user_species(&["Shigella flexneri".to_string()]);
    assert_eq!(
        store.species(),
        vec!["Shigella flexneri".to_string(), "Escherichia coli".to_string()]
    );
}

#[test]
fn closest_reference_requires_an_accession() {
    let store = Store::new();
    assert!(store.closest_reference().is_none());

    store.put_closest_reference("", "nothing");
    assert!(store.closest_reference().is_none());

    store.put_closest_reference("NZ_CP009072.1", "Escherichia coli ATCC 25922");
    store.put_closest_reference_length(5_130_767);
    let closest = store.closest_reference().unwrap();
    assert_eq!(closest.accession, "NZ_CP009072.1");
    assert_eq!(closest.length, Some(5_130_767));
    assert_eq!(closest.path, None);
}

#[test]
fn append_drops_empty_entries() {
    let store = Store::new();
    store.append("services/X/warnings", json!(["", null, "low depth"]), false);
    assert_eq!(store.get("services/X/warnings"), Some(json!(["low depth"])));
}

#[test]
fn run_info_brackets_the_run() {
    let store = Store::new();
    store.start_run("kira-bap", "0.1.0", json!({"pf_i": "0.90"}));
    assert_eq!(store.user_input("pf_i"), Some(json!("0.90")));
    assert!(store.contains("bap/run_info/time/start"));

    store.end_run("COMPLETED");
    assert_eq!(
        store.get_str("bap/run_info/status").as_deref(),
        Some("COMPLETED")
    );
    assert!(store.contains("bap/run_info/time/end"));
    assert!(store.contains("bap/run_info/time/duration"));
}

#[test]
fn write_json_persists_the_tree() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("out/bap-results.json")).unwrap();

    let store = Store::new();
    store.put_sample_id("S1");
    store.write_json(&path).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["bap"]["summary"]["sample_id"], json!("S1"));
    assert!(!path.with_extension("json.tmp").exists());
}
