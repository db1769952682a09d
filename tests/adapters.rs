use std::fs;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use serde_json::json;
use tempfile::TempDir;

use kira_bap::adapters::getreference::GetReference;
use kira_bap::adapters::plasmidfinder;
use kira_bap::adapters::speciesfinder::SpeciesFinder;
use kira_bap::domain::{JobSpec, JobState, TaskState};
use kira_bap::error::BapError;
use kira_bap::scheduler::{Job, Scheduler};
use kira_bap::service::{Outcome, execute};
use kira_bap::store::Store;

struct DirJob {
    dir: Utf8PathBuf,
    state: Arc<Mutex<JobState>>,
}

impl Job for DirJob {
    fn state(&mut self) -> JobState {
        *self.state.lock().unwrap()
    }

    fn file_path(&self, name: &str) -> Utf8PathBuf {
        self.dir.join(name)
    }

    fn error(&self) -> Option<String> {
        None
    }
}

/// Hands out jobs that all share one working directory.
struct DirScheduler {
    dir: Utf8PathBuf,
    state: Arc<Mutex<JobState>>,
    specs: Mutex<Vec<JobSpec>>,
}

impl DirScheduler {
    fn complete(&self) {
        *self.state.lock().unwrap() = JobState::Completed;
    }

    fn last_spec(&self) -> JobSpec {
        self.specs.lock().unwrap().last().cloned().unwrap()
    }
}

impl Scheduler for DirScheduler {
    fn schedule_job(
        &self,
        _name: &str,
        spec: &JobSpec,
        _label: &str,
    ) -> Result<Box<dyn Job>, BapError> {
        self.specs.lock().unwrap().push(spec.clone());
        *self.state.lock().unwrap() = JobState::Running;
        Ok(Box::new(DirJob {
            dir: self.dir.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct Fixture {
    _temp: TempDir,
    root: Utf8PathBuf,
    store: Store,
    scheduler: DirScheduler,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    fs::create_dir_all(root.join("db")).unwrap();
    fs::create_dir_all(root.join("work")).unwrap();
    fs::write(root.join("sample.fna"), ">contig1\nACGT\n").unwrap();

    let store = Store::new();
    store.put_db_root(&root.join("db"));
    store.put_user_contigs_path(&root.join("sample.fna"));

    let scheduler = DirScheduler {
        dir: root.join("work"),
        state: Arc::new(Mutex::new(JobState::Running)),
        specs: Mutex::new(Vec::new()),
    };

    Fixture {
        _temp: temp,
        root,
        store,
        scheduler,
    }
}

fn started(outcome: Outcome) -> kira_bap::task::Task {
    match outcome {
        Outcome::Started(task) => task,
        Outcome::Rejected(task) => panic!("rejected: {:?}", task.error()),
        Outcome::Skipped(reason) => panic!("skipped: {reason}"),
    }
}

#[test]
fn plasmidfinder_runs_and_normalizes_output() {
    let fx = fixture();
    let db = fx.root.join("db/plasmidfinder");
    fs::create_dir_all(&db).unwrap();
    fs::write(
        db.join("config"),
        "# db\tgroup\tdescription\nenterobacteriales\tEnterobacteriales\tEnterobacteriales\ninc18\tInc18\tGram positive\n",
    )
    .unwrap();
    fx.store.put_user_input("pf_i", "0.90");
    fx.store.put_user_input("pf_c", "0.60");
    fx.store.put_user_input("pf_s", "Enterobacteriales");

    let service = plasmidfinder::service();
    let mut task = started(execute(&service, "PlasmidFinder", None, &fx.store, &fx.scheduler));

    let spec = fx.scheduler.last_spec();
    assert_eq!(spec.command, "plasmidfinder");
    assert_eq!(&spec.args[..3], ["-q", "-j", "data.json"]);
    let d = spec.args.iter().position(|a| a == "-d").unwrap();
    assert_eq!(spec.args[d + 1], "enterobacteriales");
    assert!(spec.args.contains(&fx.root.join("sample.fna").to_string()));

    fs::write(
        fx.root.join("work/data.json"),
        json!({
            "plasmidfinder": {
                "results": {
                    "Enterobacteriales": {
                        "enterobacteriales": {
                            "IncFII_1": {
                                "plasmid": "IncFII",
                                "identity": 99.5,
                                "coverage": 100.0,
                                "contig_name": "contig1",
                                "positions_in_contig": "1..4",
                                "position_in_ref": "1..4",
                                "accession": "AY458016"
                            }
                        }
                    }
                }
            }
        })
        .to_string(),
    )
    .unwrap();
    fx.scheduler.complete();

    assert_eq!(task.report(), TaskState::Done);
    let results = fx.store.get("services/PlasmidFinder/results").unwrap();
    assert_eq!(results["search"], json!({"Enterobacteriales": ["enterobacteriales"]}));
    assert_eq!(results["groups"][0]["databases"][0]["hits"][0]["name"], json!("IncFII"));
    assert_eq!(fx.store.detected_plasmids(), vec!["IncFII".to_string()]);
}

#[test]
fn plasmidfinder_missing_output_fails() {
    let fx = fixture();
    let db = fx.root.join("db/plasmidfinder");
    fs::create_dir_all(&db).unwrap();
    fs::write(db.join("config"), "inc18\tInc18\tGram positive\n").unwrap();
    fx.store.put_user_input("pf_i", "0.90");
    fx.store.put_user_input("pf_c", "0.60");

    let mut task = started(execute(
        &plasmidfinder::service(),
        "PlasmidFinder",
        None,
        &fx.store,
        &fx.scheduler,
    ));
    fx.scheduler.complete();

    assert_eq!(task.report(), TaskState::Failed);
    assert!(task.error().unwrap().starts_with("failed to open or load JSON from file"));
}

#[test]
fn plasmidfinder_without_database_is_rejected() {
    let fx = fixture();
    fx.store.put_user_input("pf_i", "0.90");
    fx.store.put_user_input("pf_c", "0.60");

    let outcome = execute(&plasmidfinder::service(), "PlasmidFinder", None, &fx.store, &fx.scheduler);
    let Outcome::Rejected(task) = outcome else {
        panic!("expected rejection");
    };
    assert!(task.error().unwrap().starts_with("database path not found"));
}

#[test]
fn species_then_reference() {
    let fx = fixture();
    let db = fx.root.join("db/speciesfinder/bacteria");
    fs::create_dir_all(&db).unwrap();
    fs::write(db.join("bacteria.ATG.seq.b"), b"").unwrap();
    fx.store.put_user_input("sf_s", "bacteria");

    let skipped = execute(&GetReference, "GetReference", None, &fx.store, &fx.scheduler);
    assert!(matches!(skipped, Outcome::Skipped(_)));

    let mut species = started(execute(&SpeciesFinder, "SpeciesFinder", None, &fx.store, &fx.scheduler));
    let spec = fx.scheduler.last_spec();
    assert_eq!(spec.args[0], "-db");
    assert_eq!(spec.args[1], db.join("bacteria.ATG").to_string());
    assert!(!spec.args.contains(&"-tax".to_string()));

    fs::write(
        fx.root.join("work/results.res"),
        "#Template\tScore\tExpected\tTemplate_length\tTemplate_Identity\tTemplate_Coverage\tQuery_Identity\tQuery_Coverage\tDepth\tq_value\tp_value\n\
         NZ_CP009072.1 Escherichia coli ATCC 25922\t9821\t12\t5130767\t98.21\t97.40\t97.40\t98.21\t12.5\t9807.3\t1.0e-26\n",
    )
    .unwrap();
    fx.scheduler.complete();
    assert_eq!(species.report(), TaskState::Done);

    let closest = fx.store.closest_reference().unwrap();
    assert_eq!(closest.accession, "NZ_CP009072.1");
    assert_eq!(closest.name.as_deref(), Some("Escherichia coli ATCC 25922"));

    let mut reference = started(execute(&GetReference, "GetReference", None, &fx.store, &fx.scheduler));
    let spec = fx.scheduler.last_spec();
    assert_eq!(spec.command, "kma-retrieve");
    assert_eq!(spec.args.last().unwrap(), "NZ_CP009072.1");

    fs::write(fx.root.join("work/NZ_CP009072.1.fna"), ">NZ_CP009072.1\nACGTACGT\nACG\n").unwrap();
    fx.scheduler.complete();
    assert_eq!(reference.report(), TaskState::Done);

    let closest = fx.store.closest_reference().unwrap();
    assert_eq!(closest.length, Some(11));
    assert_eq!(closest.path, Some(fx.root.join("work/NZ_CP009072.1.fna")));
}
