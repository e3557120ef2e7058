use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use siteaudit::api::create_router;
use siteaudit::{AuditOrchestrator, Settings};

#[derive(Parser, Debug)]
#[command(name = "siteaudit", version, about = "Audit a site for search and content readiness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit one URL and print the report as JSON
    Audit {
        url: String,
        #[arg(long, help = "Pretty-print the report")]
        pretty: bool,
    },
    /// Serve the audit API over HTTP
    Serve {
        #[arg(long, help = "Address to bind, overrides AUDIT_BIND_ADDR")]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let orchestrator =
        AuditOrchestrator::from_settings(&settings).context("failed to build HTTP client")?;

    match cli.command {
        Commands::Audit { url, pretty } => {
            let report = orchestrator.run_audit(&url, &settings.audit).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| settings.bind_addr.clone());
            let app = create_router(Arc::new(orchestrator), settings.audit.clone());
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            log::info!("listening on {addr}");
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}
