use std::fs;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_bap::config::ConfigLoader;
use kira_bap::domain::ServiceId;
use kira_bap::error::BapError;
use kira_bap::reads::InputFiles;
use kira_bap::registry::ServiceRegistry;
use kira_bap::runner::{RunSummary, Runner};
use kira_bap::scheduler::ProcessScheduler;
use kira_bap::store::Store;

const RESULTS_FILE: &str = "bap-results.json";

#[derive(Parser)]
#[command(name = "kira-bap")]
#[command(about = "Bacterial analysis pipeline: run genomic analysis backends into one findings report")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the configured services on the configured inputs")]
    Run(RunArgs),
    #[command(about = "List the registered services")]
    Services,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{} service(s) failed: {}", .0.failed.len(), failed_names(.0))]
struct PipelineFailed(RunSummary);

fn failed_names(summary: &RunSummary) -> String {
    summary
        .failed
        .iter()
        .map(|(id, _)| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if report.downcast_ref::<PipelineFailed>().is_some() {
            return ExitCode::from(3);
        }
        if let Some(bap) = report.downcast_ref::<BapError>() {
            return ExitCode::from(map_exit_code(bap));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BapError) -> u8 {
    match error {
        BapError::MissingConfig
        | BapError::ConfigRead(_)
        | BapError::ConfigParse(_)
        | BapError::Configuration(_)
        | BapError::UnknownService(_)
        | BapError::UserInput(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = ServiceRegistry::standard()?;

    match cli.command {
        Commands::Services => {
            for id in registry.ids() {
                let default = if ServiceId::DEFAULT.contains(&id) { " (default)" } else { "" };
                let version = registry.get(id).map(|s| s.version()).unwrap_or("-");
                println!("{id}\t{version}{default}");
            }
            Ok(())
        }
        Commands::Run(args) => run_pipeline(args, &registry),
    }
}

fn run_pipeline(args: RunArgs, registry: &ServiceRegistry) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let inputs = InputFiles::classify(&config.inputs)?;

    fs::create_dir_all(config.out_dir.as_std_path()).into_diagnostic()?;

    let store = Store::new();
    config.seed(&store);
    inputs.seed(&store);

    info!(
        sample = %config.sample_id,
        services = config.services.len(),
        "starting pipeline"
    );

    let scheduler = ProcessScheduler::new(config.out_dir.join("work"));
    let summary = Runner::new(registry, &scheduler, config.poll).run(&config.services, &store);
    store.end_run(summary.status());

    let results = config.out_dir.join(RESULTS_FILE);
    store.write_json(&results)?;
    info!(path = %results, status = summary.status(), "wrote results");

    for (id, reason) in &summary.skipped {
        info!(service = %id, %reason, "skipped");
    }

    if summary.is_success() {
        Ok(())
    } else {
        Err(PipelineFailed(summary).into())
    }
}
