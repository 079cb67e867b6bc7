use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use clinorm_lib::config::{self, DispatchConfig, NormalizeConfig};
use clinorm_lib::pipeline::assemble::{assemble, merged_file_name};
use clinorm_lib::pipeline::dispatch::{
    ChatCompletionClient, Dispatcher, PromptCatalog, RetryPolicy, Shard,
};
use clinorm_lib::pipeline::ingest::{DocumentSource, JsonlRowSource, PatientFolderSource};
use clinorm_lib::pipeline::processor::{run_batch, PatientProcessor};
use clinorm_lib::pipeline::storage::{write_atomic, ArtifactStore, FsArtifactStore};

#[derive(Parser)]
#[command(name = "clinorm")]
#[command(version, about = "Normalize and de-identify Chinese clinical records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn raw patient records into canonical artifacts
    Normalize {
        /// Patient folder tree, or a JSON-lines file with --rows
        input: PathBuf,
        /// Artifact output directory
        output: PathBuf,
        /// Read `input` as a JSON-lines row export
        #[arg(long)]
        rows: bool,
        /// Normalization config (JSON); defaults to $CLINORM_CONFIG
        #[arg(long)]
        config: Option<PathBuf>,
        /// Where to write the processing report (JSON)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Merge each patient's artifacts into one record
    Assemble {
        /// Artifact directory written by `normalize`
        input: PathBuf,
        /// Directory for merged records
        output: PathBuf,
    },
    /// Send artifacts to the LLM endpoint and save the responses
    Dispatch {
        /// Artifact directory written by `normalize`
        input: PathBuf,
        /// Response directory
        output: PathBuf,
        /// Directory of `<category>.txt` prompt templates; defaults to ~/.clinorm/prompts
        #[arg(long)]
        prompts: Option<PathBuf>,
        /// This instance's index; selects the API key and patient shard
        #[arg(long, default_value_t = 0)]
        instance: usize,
        /// Dispatch config (JSON); defaults to $CLINORM_DISPATCH_CONFIG
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    clinorm_lib::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            input,
            output,
            rows,
            config,
            report,
        } => normalize(input, output, rows, config, report),
        Commands::Assemble { input, output } => assemble_all(input, output),
        Commands::Dispatch {
            input,
            output,
            prompts,
            instance,
            config,
        } => dispatch(input, output, prompts, instance, config),
    }
}

fn normalize(
    input: PathBuf,
    output: PathBuf,
    rows: bool,
    config_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config: NormalizeConfig = config::load_json(config_path.as_deref(), config::CONFIG_ENV)?;
    config.validate()?;

    let source: Box<dyn DocumentSource> = if rows {
        Box::new(JsonlRowSource::new(&input, &config.encodings)?)
    } else {
        Box::new(PatientFolderSource::new(&input, &config.encodings)?)
    };
    let store = FsArtifactStore::new(&output);
    let processor = PatientProcessor::new(&config);

    let report = run_batch(source.as_ref(), &store, &processor)
        .with_context(|| format!("reading {}", source.describe()))?;

    let report_path = report_path.unwrap_or_else(|| output.join(format!("report-{}.json", report.run_id)));
    write_atomic(&report_path, &serde_json::to_string_pretty(&report)?)?;

    println!(
        "{} patients, {} documents, {} artifacts, {} skipped (report: {})",
        report.patients,
        report.documents,
        report.artifacts,
        report.skipped.len(),
        report_path.display()
    );
    Ok(())
}

fn assemble_all(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let store = FsArtifactStore::new(&input);
    let mut merged = 0usize;
    for patient_id in store.patients()? {
        let artifacts = store.load_patient(&patient_id)?;
        if artifacts.is_empty() {
            continue;
        }
        write_atomic(&output.join(merged_file_name(&patient_id)), &assemble(&artifacts))?;
        tracing::info!(patient_id = %patient_id, artifacts = artifacts.len(), "Patient record merged");
        merged += 1;
    }
    println!("{merged} merged records written to {}", output.display());
    Ok(())
}

fn dispatch(
    input: PathBuf,
    output: PathBuf,
    prompts: Option<PathBuf>,
    instance: usize,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config: DispatchConfig =
        config::load_json(config_path.as_deref(), config::DISPATCH_CONFIG_ENV)?;
    if config.api_keys.is_empty() {
        bail!("no API keys configured; set api_keys in the dispatch config");
    }
    let shard = Shard::new(instance, config.api_keys.len())?;
    let api_key = &config.api_keys[shard.index()];

    let prompt_dir = prompts
        .or_else(config::default_prompt_dir)
        .context("no prompt directory given and no home directory found")?;
    let catalog = PromptCatalog::load(&prompt_dir)?;
    if catalog.is_empty() {
        bail!("no prompt templates found in {}", prompt_dir.display());
    }

    let client = ChatCompletionClient::new(&config, api_key)?;
    tracing::info!(instance, key = %client.key_hint(), model = %config.model, "Dispatcher ready");

    let dispatcher = Dispatcher::new(
        Box::new(client),
        catalog,
        RetryPolicy::from_config(&config),
        Duration::from_millis(config.request_delay_ms),
        &output,
    );
    let summary = dispatcher.run(&FsArtifactStore::new(&input), shard)?;

    println!(
        "{} sent, {} already done, {} without prompt, {} failed",
        summary.sent, summary.already_done, summary.no_prompt, summary.failed
    );
    Ok(())
}
