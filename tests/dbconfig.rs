use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_bap::dbconfig::{DbConfig, config_path};
use kira_bap::error::BapError;

const CONFIG: &str = "db1\tgrpA\tdesc1\ndb2\tgrpA\tdesc2\ndb3\tgrpB\tdesc3\n";

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn resolve_groups_and_databases() {
    let cfg = DbConfig::parse_str(CONFIG).unwrap();
    let resolved = cfg.resolve(&["grpA", "db3"]).unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved["grpA"], names(&["db1", "db2"]));
    assert_eq!(resolved["grpB"], names(&["db3"]));
}

#[test]
fn empty_request_selects_everything_once() {
    let cfg = DbConfig::parse_str(CONFIG).unwrap();
    let resolved = cfg.resolve::<&str>(&[]).unwrap();
    assert_eq!(&resolved, cfg.groups());
}

#[test]
fn merged_names_are_deduplicated_in_request_order() {
    let cfg = DbConfig::parse_str(CONFIG).unwrap();
    let resolved = cfg.resolve(&["db2", "grpA", "db2"]).unwrap();
    assert_eq!(resolved["grpA"], names(&["db2", "db1"]));
}

#[test]
fn database_in_two_groups_is_a_configuration_error() {
    let err = DbConfig::parse_str("db1\tgrpA\tx\ndb1\tgrpB\ty\n").unwrap_err();
    assert_matches!(err, BapError::Configuration(msg) if msg.contains("db1"));
}

#[test]
fn wrong_column_count_is_a_configuration_error() {
    let err = DbConfig::parse_str("db1\tgrpA\n").unwrap_err();
    assert_matches!(err, BapError::Configuration(msg) if msg.starts_with("invalid database config line"));
}

#[test]
fn unknown_name_lists_what_is_available() {
    let cfg = DbConfig::parse_str(CONFIG).unwrap();
    let err = cfg.resolve(&["grpC"]).unwrap_err();
    assert_matches!(err, BapError::UserInput(_));
    assert_eq!(
        err.to_string(),
        "unknown group or database: grpC; available are: grpA (db1, db2); grpB (db3)"
    );
}

#[test]
fn load_reads_config_under_db_root() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

    let err = DbConfig::load(&root).unwrap_err();
    assert_matches!(err, BapError::Configuration(msg) if msg.contains("database config file missing"));

    std::fs::write(config_path(&root), format!("# comment\n\n{CONFIG}")).unwrap();
    let cfg = DbConfig::load(&root).unwrap();
    assert_eq!(cfg.groups().len(), 2);
}
