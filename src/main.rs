use anyhow::Context;
use clap::{Parser, Subcommand};
use im_reconciliation::{
    archive::ReportArchive, config::Config, query, scanner::FolderScanner,
    service::ReconciliationService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "im-recon", about = "Reconcile trade extracts against acknowledgments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest the given files in order and print the latest report
    Process { files: Vec<PathBuf> },
    /// Poll the configured folders and reconcile every new file
    Watch,
    /// Print every archived report
    History,
    /// Answer a question from the latest archived report
    Ask { question: Vec<String> },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_archive(config: &Config) -> anyhow::Result<ReportArchive> {
    let db = sled::open(&config.archive_path)
        .with_context(|| format!("opening archive at {}", config.archive_path.display()))?;
    Ok(ReportArchive::new(Arc::new(db))?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_logging(&config);

    let problems = config.validate();
    if !problems.is_empty() {
        anyhow::bail!("configuration errors: {}", problems.join("; "));
    }
    config.ensure_folders()?;

    match cli.command {
        Command::Process { files } => {
            let service = ReconciliationService::new()
                .with_archive(open_archive(&config)?)
                .with_max_file_size(config.max_file_size_bytes());

            for file in &files {
                let outcome = service.process_file(file)?;
                if let Some(e) = outcome.parse_error {
                    warn!(source = %outcome.source_id, error = %e, "file skipped");
                }
                if let Some(e) = outcome.archive_error {
                    warn!(source = %outcome.source_id, error = %e, "report not archived");
                }
            }
            if let Some(report) = service.latest()? {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Watch => {
            if !config.monitoring_enabled {
                info!("folder monitoring disabled");
                return Ok(());
            }
            let service = ReconciliationService::new()
                .with_archive(open_archive(&config)?)
                .with_max_file_size(config.max_file_size_bytes());
            let mut scanner = FolderScanner::new(config.monitored_folders(), config.debounce());

            info!(folders = ?config.monitored_folders(), "folder monitoring started");
            loop {
                let files = scanner.poll();
                for file in &files {
                    info!(path = %file.display(), "new file detected");
                }
                // errors are logged per file, monitoring carries on
                for outcome in service.process_files(&files) {
                    if let Some(report) = outcome.report {
                        println!("{}", report.to_document());
                    }
                }
                std::thread::sleep(config.poll_interval());
            }
        }
        Command::History => {
            let archive = open_archive(&config)?;
            for entry in archive.all()? {
                println!("[{}]\n{}", entry.id, entry.report.to_document());
            }
        }
        Command::Ask { question } => {
            let archive = open_archive(&config)?;
            let latest = archive.latest()?;
            let answer = query::answer(latest.as_ref().map(|a| &a.report), &question.join(" "));
            println!("{}", answer.text);
        }
    }

    Ok(())
}
