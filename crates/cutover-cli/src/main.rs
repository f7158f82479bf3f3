use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod settings;

#[derive(Parser)]
#[command(
    name = "cutover",
    about = "cutover — digest-pinned Cloud Run deploys with health-verified rollback",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to the config file. Without it, ./cutover.toml is read if present.
    #[arg(long, global = true, env = "CUTOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (logs go to stderr).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy an image by digest, verify its health, roll back on failure.
    ///
    /// Exit codes: 0 deployed or skipped, 2 digest resolution failed,
    /// 3 deploy failed, 4 unhealthy and rolled back, 5 unhealthy with no
    /// prior revision, 6 rollback failed, 130 cancelled.
    Deploy(commands::deploy::DeployArgs),
    /// Evaluate the trigger gate only and report whether to deploy.
    Gate(commands::gate::GateArgs),
    /// Write a cutover.toml scaffold.
    Init(commands::init::InitArgs),
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,cutover=debug"));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => fmt.init(),
        LogFormat::Json => fmt.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Deploy(args) => {
            let config = settings::load_config(cli.config.as_deref())?;
            commands::deploy::run(args, config).await
        }
        Commands::Gate(args) => {
            let config = settings::load_config(cli.config.as_deref())?;
            commands::gate::run(args, config.as_ref())
        }
        Commands::Init(args) => {
            let path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(settings::DEFAULT_CONFIG));
            commands::init::run(args, &path)
        }
    }
}
