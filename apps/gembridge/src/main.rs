use std::error::Error;
use std::sync::Arc;

use clap::Parser;
mod cli;
use gembridge_core::{Core, GeminiUpstream};
use gembridge_transform::Settings;
use tracing::info;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("gembridge failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    info!(
        native_tools = settings.enable_native_tools,
        google_search = settings.enable_google_search,
        url_context = settings.enable_url_context,
        priority = ?settings.priority,
        request_control = settings.allow_request_control,
        inline_citations = settings.enable_inline_citations,
        grounding_metadata = settings.include_grounding_metadata,
        search_entry_point = settings.include_search_entry_point,
        "settings loaded"
    );

    let upstream = Arc::new(GeminiUpstream::new(cli.base_url.clone(), cli.api_key.clone())?);
    info!(base_url = %cli.base_url, "upstream ready");

    let core = Core::new(upstream, settings);
    let app = core.router();

    let bind = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("gembridge=info,gembridge_core=info,tower_http=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
