// WMTB - Web Server
// Loads settings, opens the ledger, and serves the REST API

use anyhow::{Context, Result};
use wmtb::server::{serve, AppState};
use wmtb::{open_database, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    settings.log.init_tracing();

    tracing::info!("WMTB Backend v{} starting", wmtb::VERSION);

    let conn = open_database(settings.database.path.as_deref())?;
    let parser = settings.parser.build_parser()?;
    tracing::info!(rules = parser.rules().rule_count(), "transaction parser ready");

    let addr = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    serve(AppState::new(conn, parser), listener).await
}
