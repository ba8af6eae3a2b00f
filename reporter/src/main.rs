use clap::{Parser, Subcommand};
use quarantine::ResultStore;
use reporter::{expand_test_files, ConsoleReporter, ReporterConfig, RunReporter, RunResults};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "quarantine-report")]
#[command(about = "Summarize quarantined tests recorded during a test run")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root the quarantine logs live under (defaults to the working directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine the logs of the given test files and print the summary
    Report {
        /// Test files that ran, or glob patterns matching them
        files: Vec<String>,
        /// List every quarantined test
        #[arg(short, long)]
        show_tests: bool,
        /// Disable ANSI colors
        #[arg(long)]
        no_color: bool,
    },
    /// Show the quarantine log of a single test file
    Log {
        /// The test file whose log to show
        file: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<ReporterConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ReporterConfig::load(path)?,
        None => ReporterConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.storage.root = root.clone();
    }
    config.storage.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Report {
            files,
            show_tests,
            no_color,
        } => {
            let mut options = config.reporter;
            if show_tests {
                options = options.with_show_tests(true);
            }
            if no_color {
                options = options.with_color(false);
            }

            let results = RunResults::new(expand_test_files(&files)?);
            info!(files = results.test_files.len(), "reporting quarantined tests");

            let mut reporter = ConsoleReporter::new(config.storage, options);
            if let Err(e) = reporter.on_run_complete(&results).await {
                error!("Report failed: {}", e);
                return Err(e.into());
            }
        }
        Commands::Log { file } => {
            let store = ResultStore::new(config.storage);
            println!("{}", store.log_path(&file).display());
            match store.load(&file)? {
                Some(records) => {
                    for record in records {
                        println!("  {} [{}]", record.detail_line(), record.date.to_rfc3339());
                    }
                }
                None => println!("  no quarantined tests"),
            }
        }
    }

    Ok(())
}
