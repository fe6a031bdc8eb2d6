//! hive：把一个自然语言请求交给编排引擎运行到停机，打印轨迹与停机原因
//!
//! Ctrl-C 取消当前会话的运行（状态照常保存）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use hive::config::load_config;
use hive::core::{build_engine, RoutingDecision, RunOutcome};
use hive::observability;

/// Supervisor-routed financial analysis
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra config file layered over config/default.toml
    #[arg(short, long, env = "HIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Session id; reuse one to continue a stored session
    #[arg(short, long)]
    session: Option<String>,

    /// Step budget for this run (defaults to orchestrator.step_budget)
    #[arg(short, long)]
    budget: Option<usize>,

    /// The request, e.g. "Analyze AAPL, create a 3mo chart and save a report"
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let cfg = load_config(cli.config).context("Failed to load config")?;
    let engine = Arc::new(build_engine(&cfg).await.context("Failed to build engine")?);

    let session_id = cli
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let budget = cli.budget.unwrap_or(engine.step_budget());
    let query = cli.query.join(" ");
    tracing::info!(session = %session_id, budget, "submitting request");

    let watcher = {
        let engine = engine.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling session {}", session_id);
                engine.cancel(&session_id);
            }
        })
    };

    let outcome = engine
        .submit_with_budget(&session_id, &query, budget)
        .await
        .context("Run failed")?;
    watcher.abort();

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    println!("session: {}", outcome.state.session_id);
    for step in &outcome.trace {
        match (&step.decision, &step.output) {
            (RoutingDecision::Route(c), Some(msg)) => {
                println!("\n[{}] {}", step.step, c);
                println!("{}", msg.content);
                for call in &msg.structured_calls {
                    let mark = if call.success { "ok" } else { "failed" };
                    let sim = if call.simulated { " (simulated)" } else { "" };
                    match &call.location {
                        Some(loc) => println!("  - {} {}{} -> {}", call.tool, mark, sim, loc),
                        None => println!("  - {} {}{}", call.tool, mark, sim),
                    }
                }
            }
            (decision, _) => println!("\n[{}] {}", step.step, decision),
        }
    }
    println!("\nhalt: {} after {} steps", outcome.halt, outcome.trace.len());
}
