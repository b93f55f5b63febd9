#![expect(clippy::print_stdout)]

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use neatdata::config::AppSettings;
use neatdata::io::{DirectorySink, FileLoader, TableFormat, load_table, save_table};
use neatdata::jobs::{JobOutcome, JobWorker};
use neatdata::pipeline::{PipelineEngine, PipelineRequest, RunReport};
use neatdata::progress::ChannelConnection;
use neatdata::service::CleaningService;
use neatdata::transforms::{Params, TransformRegistry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "neatdata", about = "Tabular data cleaning pipelines", version)]
pub struct Cli {
    /// Extension manifest directory. Overrides the configured one.
    #[arg(long, global = true, env = "NEATDATA_EXTENSIONS_DIR")]
    pub extensions_dir: Option<PathBuf>,

    /// Log to the console only
    #[arg(long, global = true)]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List built-in and extension transforms
    Transforms {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clean a single file
    Clean {
        /// Input file (CSV, Parquet, JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file. Defaults to `<input stem>_cleaned.<ext>` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transforms to apply in order, by key or name. Defaults to the configured modules.
        #[arg(short, long, value_delimiter = ',')]
        modules: Vec<String>,

        /// JSON file with parameter overrides keyed by transform key
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Execute a pipeline request file
    Run {
        /// Path to the request JSON
        request: PathBuf,
    },
    /// Queue several files as jobs and process them
    Batch {
        /// Input files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory. Defaults to the configured one.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format: csv, parquet or json
        #[arg(long, default_value = "csv")]
        format: String,

        /// Transforms to apply in order
        #[arg(short, long, value_delimiter = ',')]
        modules: Vec<String>,
    },
}

pub async fn run_command(cli: Cli, settings: AppSettings) -> Result<()> {
    let extensions_dir = cli.extensions_dir.or_else(|| settings.extensions_dir.clone());
    let registry = Arc::new(TransformRegistry::discover(extensions_dir));

    match cli.command {
        Commands::Transforms { json } => handle_transforms(&registry, json),
        Commands::Clean {
            input,
            output,
            modules,
            params,
        } => handle_clean(&registry, &settings, &input, output, modules, params),
        Commands::Run { request } => handle_run(&registry, &request),
        Commands::Batch {
            files,
            output_dir,
            format,
            modules,
        } => handle_batch(registry, &settings, files, output_dir, &format, modules).await,
    }
}

fn handle_transforms(registry: &TransformRegistry, json: bool) -> Result<()> {
    let catalog = registry.catalog();
    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    println!("{:<24} {:<28} {:>5}  {:<9}  DESCRIPTION", "KEY", "NAME", "ORDER", "SOURCE");
    for entry in &catalog {
        println!(
            "{:<24} {:<28} {:>5}  {:<9}  {}",
            entry.key,
            entry.name,
            entry.order,
            entry.source.to_string(),
            entry.description
        );
    }
    if let Some(dir) = registry.extension_dir() {
        println!("\nExtensions directory: {}", dir.display());
    }
    Ok(())
}

fn handle_clean(
    registry: &Arc<TransformRegistry>,
    settings: &AppSettings,
    input: &Path,
    output: Option<PathBuf>,
    modules: Vec<String>,
    params: Option<PathBuf>,
) -> Result<()> {
    let overrides = match params {
        Some(path) => load_overrides(&path)?,
        None => HashMap::new(),
    };
    let service = CleaningService::new(Arc::clone(registry));
    let chosen = selection(modules, settings);
    let outcome = service.clean_file(input, chosen.as_deref(), &overrides)?;

    let output = output.unwrap_or_else(|| default_output(input));
    save_table(&outcome.frame, &output)?;
    print_report(&outcome.report);
    println!("Saved to {}", output.display());
    Ok(())
}

fn handle_run(registry: &Arc<TransformRegistry>, request_path: &Path) -> Result<()> {
    let request = PipelineRequest::from_file(request_path)?;
    let engine = PipelineEngine::new(Arc::clone(registry));
    let steps = match &request.ordered {
        Some(keys) => engine.build_ordered(keys, &request.params),
        None => engine.build(
            request.core.as_deref(),
            request.extensions.as_deref(),
            &request.params,
        ),
    };

    println!("Running {} step(s) on {}...", steps.len(), request.input.display());
    let df = load_table(&request.input)?;
    let outcome = PipelineEngine::run(&steps, &df)?;
    print_report(&outcome.report);

    if let Some(output) = &request.output {
        save_table(&outcome.frame, output)?;
        println!("Saved to {}", output.display());
    } else {
        println!("{}", outcome.frame.head(Some(10)));
    }
    Ok(())
}

async fn handle_batch(
    registry: Arc<TransformRegistry>,
    settings: &AppSettings,
    files: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    format: &str,
    modules: Vec<String>,
) -> Result<()> {
    let format: TableFormat = format.parse()?;
    let output_dir = output_dir
        .or_else(|| settings.output_dir.clone())
        .context("No output directory given and none configured")?;
    let modules = selection(modules, settings).unwrap_or_else(|| registry.builtin_keys());

    let service = Arc::new(CleaningService::new(registry));
    for file in &files {
        let job = service.submit_job(file.to_string_lossy(), modules.clone());
        println!("Queued {} as job {}", file.display(), job.id);
    }

    // mirror the broadcast channel into the log while the worker runs
    let (connection, mut rx) = ChannelConnection::new();
    let stream = service.open_broadcast_stream(connection);
    let listener = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            tracing::debug!(target: "neatdata::progress", "{message}");
        }
    });

    let worker = JobWorker::new(Arc::clone(&service), Arc::new(FileLoader::default()))
        .with_sink(Arc::new(DirectorySink::new(output_dir.clone(), format)));
    let outcomes = tokio::task::spawn_blocking(move || worker.drain())
        .await
        .context("Job worker panicked")?;

    service.broadcaster().disconnect(stream);
    listener.await.context("Progress listener panicked")?;

    let mut failed = 0;
    for outcome in &outcomes {
        match outcome {
            JobOutcome::Completed { job_id, report } => {
                println!("{job_id}: {}", report.summary());
            }
            JobOutcome::Failed { job_id, message } => {
                failed += 1;
                println!("{job_id}: FAILED: {message}");
            }
            JobOutcome::Cancelled { job_id } => println!("{job_id}: cancelled"),
        }
    }

    let stats = service.queue().stats();
    println!(
        "{} job(s): {} completed, {} failed. Output in {}",
        stats.total,
        stats.completed,
        stats.failed,
        output_dir.display()
    );
    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}

/// Explicit modules win, then the configured defaults
fn selection(modules: Vec<String>, settings: &AppSettings) -> Option<Vec<String>> {
    if modules.is_empty() {
        settings.module_selection().map(<[String]>::to_vec)
    } else {
        Some(modules)
    }
}

fn load_overrides(path: &Path) -> Result<HashMap<String, Params>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context("Parameter file must map transform keys to objects")
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_owned());
    input.with_file_name(format!("{stem}_cleaned.{ext}"))
}

fn print_report(report: &RunReport) {
    println!("{}", report.summary());
    if !report.steps_applied.is_empty() {
        println!("Steps: {}", report.steps_applied.join(" → "));
    }
}
