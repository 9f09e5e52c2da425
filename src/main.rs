use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use leafcheck::config::PipelineArgs;
use leafcheck::error::ConfigError;
use leafcheck::server::{create_router, AppState, ServiceConfig};
use leafcheck::store::SqliteStore;

/// Leaf disease diagnosis server
#[derive(Parser, Debug)]
#[command(name = "leafcheck", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// SQLite database with curated pesticide and disease data
    #[arg(long, env = "DATABASE_PATH", default_value = "agri_ai.db")]
    database: PathBuf,

    /// Require `Authorization: Bearer <token>` on /predict and /seed-data
    #[arg(long, env = "AUTH_REQUIRED", default_value_t = false, action = clap::ArgAction::Set)]
    auth_required: bool,

    /// Token accepted when auth is required
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    leafcheck::init_tracing();

    if cli.auth_required && cli.api_token.is_none() {
        return Err(ConfigError::MissingApiToken.into());
    }

    info!("leafcheck v{}", env!("CARGO_PKG_VERSION"));
    info!("  Classifier mode: {:?}", cli.pipeline.classifier_mode);
    info!("  Database:        {}", cli.database.display());
    info!("  Auth required:   {}", cli.auth_required);

    let catalog = Arc::new(
        SqliteStore::open(&cli.database)
            .with_context(|| format!("failed to open {}", cli.database.display()))?,
    );

    let labels = cli.pipeline.load_labels().await?;
    let classifier = cli.pipeline.load_classifier().await;
    if classifier.is_none() && !cli.pipeline.degraded_fallback {
        warn!("No classifier loaded and degraded fallback disabled; /predict will return 503");
    }

    let assembler =
        cli.pipeline
            .build_assembler(labels, classifier, catalog.clone(), catalog.clone())?;

    let config = ServiceConfig {
        classifier_mode: cli.pipeline.classifier_mode,
        max_upload_bytes: cli.pipeline.max_upload_bytes(),
        auth_required: cli.auth_required,
        api_token: cli.api_token,
    };
    let state = Arc::new(AppState::new(config, assembler, catalog));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Listening on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
