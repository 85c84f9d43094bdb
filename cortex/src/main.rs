mod config;
mod pipeline;
mod telemetry;

use crate::config::Config;
use crate::pipeline::{Outcome, RunError};
use clap::{Parser, Subcommand};
use sources::Sources;
use sources::sink::{ControlPlaneSink, HttpControlPlaneSink};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cortex", about = "Compiles the edge proxy routing table")]
struct Cli {
    #[arg(long, short, default_value = "cortex.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Compile the routing table and write the rendered proxy configuration.
    Compile {
        /// Defaults to stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Compile and publish to the control plane if the table changed.
    Publish {
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the configuration file and exit.
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid config {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let CliCommand::CheckConfig = cli.command {
        println!("Config {} is valid", cli.config.display());
        return ExitCode::SUCCESS;
    }

    let _guard = match telemetry::init(&config.common) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Could not initialize telemetry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, config: &Config) -> Result<(), RunError> {
    let sources = Sources::from_config(&config.sources)?;
    let compilation = pipeline::load_and_compile(&sources, &config.compiler).await?;

    match command {
        CliCommand::Compile { output } => {
            let payload = pipeline::render_output(&compilation)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &payload).await?;
                    tracing::info!(path = %path.display(), bytes = payload.len(), "Wrote configuration");
                }
                None => {
                    use tokio::io::AsyncWriteExt;
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&payload).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
            }
        }
        CliCommand::Publish { dry_run } => {
            let store = sources::published_store(config.state.as_ref());
            let sink = match &config.sink {
                Some(sink) => Some(HttpControlPlaneSink::new(sink)?),
                None => None,
            };
            let sink = sink.as_ref().map(|s| s as &dyn ControlPlaneSink);

            match pipeline::publish(&compilation, store.as_ref(), sink, dry_run).await? {
                Outcome::Unchanged { version } => println!("unchanged (version {version})"),
                Outcome::Published { version, digest } => {
                    println!("published version {version} ({digest})")
                }
                Outcome::DryRun { version, digest } => {
                    println!("would publish version {version} ({digest})")
                }
            }
        }
        CliCommand::CheckConfig => {}
    }
    Ok(())
}
