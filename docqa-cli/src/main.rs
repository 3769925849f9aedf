use anyhow::Result;
use clap::Parser as _;
use docqa_cli::{Cli, commands};
use docqa_telemetry::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    docqa_telemetry::init_with_format("docqa", format)
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    commands::run(cli).await
}
