//! Runs a single aggregation pass against the configured sources and prints
//! the text dashboard. Handy for checking credentials before deploying.

use anyhow::Result;
use devops_status_aggregator::{
    build_aggregator,
    config::DashboardConfig,
    render::{Renderer, StdoutRenderer},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = DashboardConfig::from_env();
    let snapshot = build_aggregator(&cfg).aggregate(&cfg.sources).await;
    let all_down = snapshot.available_count() == 0;
    StdoutRenderer.render(snapshot);

    if all_down {
        anyhow::bail!("no source returned data");
    }
    Ok(())
}
