//! hive-provider：在 stdin/stdout 上以 JSON-RPC 暴露一个内置 provider
//!
//! 用法：`hive-provider <stock_data|plot|news|report>`，由 [[tools.providers]] 配置为子进程启动。

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;

use hive::config::load_config;
use hive::observability;
use hive::tools::builtin::{provider_by_name, PROVIDER_NAMES};
use hive::tools::serve;

#[derive(Parser, Debug)]
#[command(name = "hive-provider")]
#[command(author, version, about = "Serve a built-in tool provider over stdio", long_about = None)]
struct Cli {
    /// Provider name
    #[arg(value_parser = clap::builder::PossibleValuesParser::new(PROVIDER_NAMES))]
    provider: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();
    let cfg = load_config(None).context("Failed to load config")?;
    let provider = provider_by_name(&cli.provider, &cfg)
        .with_context(|| format!("unknown provider '{}'", cli.provider))?;

    tracing::info!(provider = %cli.provider, "serving on stdio");
    serve(
        &provider,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("provider loop failed")
}
