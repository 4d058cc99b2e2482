use anyhow::Result;
use clap::Parser;

use keyareas::cli::Cli;
use keyareas::commands::{self, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    keyareas_client::init_tracing(cli.log_filter.clone())?;

    let services = keyareas::services_for(&cli)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    commands::execute(
        &services,
        cli.command,
        OutputFormat::from_flag(cli.json),
        &mut handle,
    )
    .await
}
