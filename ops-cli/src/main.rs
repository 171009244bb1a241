use clap::Parser;
use config_engine::SettingsLoader;
use ops_cli::{cli::Cli, commands, exit_code};
use std::process::ExitCode;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut loader = SettingsLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut settings = loader.load()?;

    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }
    telemetry::init_tracing(&settings.logging)?;
    debug!("Running {:?}", cli.command);

    commands::execute(cli.command, settings).await
}
