//! refinery-wrench CLI - drives source files through a refine service.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use wrench_client::{ClientConfig, RefineClient};
use wrench_core::{
    ensure_distinct_exports, ApplyOutcome, BatchSummary, CoreError, ExportFormat, ImportOptions,
    OperationBatch, PipelineOutcome, PipelineTask, ProjectId, ProjectName, SourceFormat,
};
use wrench_worker::{
    CompletionPoller, EngineConfig, Orchestrator, OrchestratorError, PipelineError, PollConfig,
};

mod discover;
mod logging;

use logging::LogLevel;

/// refinery-wrench - batch create, transform, export and delete refine projects
#[derive(Parser)]
#[command(name = "refinery-wrench", version)]
#[command(about = "Run operation batches over files with a refine service", long_about = None)]
struct Cli {
    /// Service host
    #[arg(long, default_value = "localhost", global = true)]
    host: String,

    /// Service port
    #[arg(long, default_value_t = 3333, global = true)]
    port: u16,

    /// Log level
    #[arg(long, value_enum, ignore_case = true, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    logfile: Option<PathBuf>,

    /// Per-request timeout in seconds (0 disables)
    #[arg(long, default_value_t = 60, global = true)]
    request_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let timeout = match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ClientConfig::new(&self.host, self.port).with_request_timeout(timeout)
    }
}

/// How source files are parsed on import.
#[derive(Args, Debug)]
struct ImportArgs {
    /// Source file format (csv or xml)
    #[arg(long, default_value = "csv")]
    source_format: SourceFormat,

    /// Source file encoding
    #[arg(long, default_value = "UTF-8")]
    encoding: String,

    /// XML record path element (repeat for nested elements)
    #[arg(long)]
    record_path: Vec<String>,

    /// CSV column separator
    #[arg(long, default_value = ",")]
    columns_separator: String,

    /// JSON object of import option overrides
    #[arg(long)]
    custom_options: Option<String>,
}

impl ImportArgs {
    fn to_options(&self) -> Result<ImportOptions, CoreError> {
        let options = ImportOptions::for_format(
            self.source_format,
            Some(&self.encoding),
            &self.record_path,
            Some(&self.columns_separator),
        );

        match &self.custom_options {
            Some(raw) => options.with_overrides(&ImportOptions::parse_overrides(raw)?),
            None => Ok(options),
        }
    }
}

/// How long and how often to wait for deferred operations.
#[derive(Args, Debug)]
struct PollArgs {
    /// Pause between process status queries, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Give up waiting after this many seconds (unbounded if unset)
    #[arg(long)]
    poll_timeout_secs: Option<u64>,
}

impl PollArgs {
    fn to_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.poll_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every source file in a directory through the full pipeline
    Batch {
        /// Directory holding the source files
        #[arg(long)]
        source_dir: PathBuf,

        /// Directory receiving the exports
        #[arg(long)]
        export_dir: PathBuf,

        /// JSON file with the operation batch
        #[arg(long)]
        mappings_file: PathBuf,

        /// Number of files processed at once
        #[arg(long, default_value_t = 1)]
        max_workers: usize,

        /// Export format (csv or tsv)
        #[arg(long, default_value = "csv")]
        export_format: ExportFormat,

        #[command(flatten)]
        import: ImportArgs,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Create a project from one file and print its id
    Create {
        /// File to upload
        #[arg(long)]
        source_file: PathBuf,

        /// Project name (defaults to the file stem plus a random suffix)
        #[arg(long)]
        project_name: Option<String>,

        #[command(flatten)]
        import: ImportArgs,
    },

    /// Apply an operation batch to a project
    Apply {
        /// Project id
        #[arg(long)]
        project_id: String,

        /// JSON file with the operation batch
        #[arg(long)]
        mappings_file: PathBuf,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Export the rows of a project to a file
    Export {
        /// Project id
        #[arg(long)]
        project_id: String,

        /// Destination file
        #[arg(long)]
        export_file: PathBuf,

        /// Export format (csv or tsv)
        #[arg(long, default_value = "csv")]
        export_format: ExportFormat,
    },

    /// Delete a project
    Delete {
        /// Project id
        #[arg(long)]
        project_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    logging::init(cli.log_level, cli.logfile.as_deref())?;

    let config = cli.client_config();
    info!(base_url = %config.base_url, "Using refine service");
    let client = RefineClient::new(&config)?;

    match cli.command {
        Commands::Batch {
            source_dir,
            export_dir,
            mappings_file,
            max_workers,
            export_format,
            import,
            poll,
        } => {
            let engine = EngineConfig {
                max_workers,
                poll: poll.to_config(),
            };
            run_batch(
                client,
                &source_dir,
                &export_dir,
                &mappings_file,
                export_format,
                &import,
                &engine,
            )
            .await?;
        }
        Commands::Create {
            source_file,
            project_name,
            import,
        } => {
            let name = match project_name {
                Some(name) => ProjectName::new(name),
                None => ProjectName::for_source(&source_file),
            };
            create_project(&client, &source_file, &name, &import).await?;
        }
        Commands::Apply {
            project_id,
            mappings_file,
            poll,
        } => {
            apply_operations(&client, ProjectId::new(project_id), &mappings_file, &poll).await?;
        }
        Commands::Export {
            project_id,
            export_file,
            export_format,
        } => {
            export_rows(&client, ProjectId::new(project_id), &export_file, export_format).await?;
        }
        Commands::Delete { project_id } => {
            let code = client.delete_project(&ProjectId::new(project_id)).await?;
            println!("{}", code);
        }
    }

    Ok(())
}

async fn load_batch(path: &Path) -> Result<OperationBatch, Box<dyn Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(OperationBatch::from_json(&raw)?)
}

async fn run_batch(
    client: RefineClient,
    source_dir: &Path,
    export_dir: &Path,
    mappings_file: &Path,
    export_format: ExportFormat,
    import: &ImportArgs,
    engine: &EngineConfig,
) -> Result<(), Box<dyn Error>> {
    let options = Arc::new(import.to_options()?);
    let batch = load_batch(mappings_file).await?;

    let files = discover::source_files(source_dir, import.source_format)?;
    info!(
        dir = %source_dir.display(),
        files = files.len(),
        format = %import.source_format,
        "Discovered source files"
    );
    if files.is_empty() {
        println!("No {} files in {}", import.source_format, source_dir.display());
        return Ok(());
    }

    let tasks = build_tasks(
        files,
        import.source_format,
        options,
        &batch,
        export_dir,
        export_format,
    )?;

    let orchestrator = Orchestrator::from_config(Arc::new(client), engine);
    match orchestrator.run(tasks).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            if let OrchestratorError::WorkerCrashed { completed, .. } = &e {
                print_summary(completed);
            }
            Err(e.into())
        }
    }
}

/// One task per source file, refusing batches where two files would share an
/// export target.
fn build_tasks(
    files: Vec<PathBuf>,
    source_format: SourceFormat,
    options: Arc<ImportOptions>,
    batch: &OperationBatch,
    export_dir: &Path,
    export_format: ExportFormat,
) -> Result<Vec<PipelineTask>, CoreError> {
    let tasks: Vec<PipelineTask> = files
        .into_iter()
        .map(|file| {
            PipelineTask::new(
                file,
                source_format,
                options.clone(),
                batch.clone(),
                export_dir,
            )
            .with_export_format(export_format)
        })
        .collect();

    ensure_distinct_exports(&tasks)?;
    Ok(tasks)
}

async fn create_project(
    client: &RefineClient,
    source_file: &Path,
    name: &ProjectName,
    import: &ImportArgs,
) -> Result<(), Box<dyn Error>> {
    let options = import.to_options()?;

    let id = client
        .create_project(source_file, name, import.source_format, &options)
        .await?;

    println!("{}", id);
    Ok(())
}

async fn apply_operations(
    client: &RefineClient,
    project: ProjectId,
    mappings_file: &Path,
    poll: &PollArgs,
) -> Result<(), Box<dyn Error>> {
    let batch = load_batch(mappings_file).await?;

    match client.apply_operations(&project, &batch).await? {
        ApplyOutcome::Accepted => println!("{}", ApplyOutcome::Accepted),
        ApplyOutcome::Pending => {
            println!("{}", ApplyOutcome::Pending);
            CompletionPoller::new(&poll.to_config())
                .wait_until_idle(client, &project)
                .await?;
            println!("{}", ApplyOutcome::Accepted);
        }
        ApplyOutcome::Rejected(code) => return Err(PipelineError::ApplyRejected(code).into()),
    }

    Ok(())
}

async fn export_rows(
    client: &RefineClient,
    project: ProjectId,
    export_file: &Path,
    format: ExportFormat,
) -> Result<(), Box<dyn Error>> {
    let body = client.export_rows(&project, format).await?;

    if let Some(parent) = export_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(export_file, body.as_bytes()).await?;

    println!("Exported project {} to {}", project, export_file.display());
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    let mut outcomes: Vec<&PipelineOutcome> = summary.outcomes.iter().collect();
    outcomes.sort_by(|a, b| a.source.cmp(&b.source));

    println!("{:<40}  {:<6}  {:<9}  {}", "FILE", "RESULT", "STATE", "DETAIL");
    println!("{}", "-".repeat(80));

    for outcome in outcomes {
        let file = outcome
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let state = outcome
            .reached
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let (result, detail) = match &outcome.failure {
            None => (
                "ok",
                outcome
                    .export_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            Some(failure) => ("FAILED", failure.to_string()),
        };

        println!("{:<40}  {:<6}  {:<9}  {}", file, result, state, detail);
        if let Some(cleanup) = &outcome.cleanup_error {
            println!("{:<40}  {:<6}  {:<9}  cleanup: {}", "", "", "", cleanup);
        }
    }

    println!();
    println!(
        "{} files: {} succeeded, {} failed",
        summary.len(),
        summary.success_count(),
        summary.failure_count()
    );
}
