//! Compass: terminal client for a server-driven onboarding flow
//!
//! The backend decides which question comes next; this client renders
//! each node, relays answers, and shows the terminal result.

mod client;
mod flow;
mod runtime;
mod state_machine;
mod tui;

use clap::Parser;
use client::FlowClient;
use runtime::FlowRuntime;
use state_machine::FlowConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for the onboarding flow service")]
struct Args {
    /// Flow definition to run
    #[arg(long, default_value = "career_onboarding_v1")]
    flow_id: String,

    /// Base URL of the flow API (the compass proxy or the backend itself)
    #[arg(long, default_value = "http://127.0.0.1:3000/api")]
    api_base: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so they don't fight the alternate screen.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compass=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let service = Arc::new(FlowClient::new(args.api_base));
    let handle = FlowRuntime::spawn(FlowConfig::new(args.flow_id), service);

    // The flow starts immediately on launch.
    handle.start_flow().await;

    let mut terminal = tui::setup_terminal()?;
    let result = tui::App::new(handle).run(&mut terminal).await;
    tui::restore_terminal(&mut terminal)?;

    result?;
    Ok(())
}
