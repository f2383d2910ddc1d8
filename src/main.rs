use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use blueprint_wizard::config::Config;
use blueprint_wizard::demo::DemoGateway;
use blueprint_wizard::gateway::GenerationGateway;
use blueprint_wizard::gemini::GeminiClient;
use blueprint_wizard::routes::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    let gateway: Arc<dyn GenerationGateway> = if config.is_demo() {
        tracing::info!("No GEMINI_API_KEY set, using demo gateway");
        Arc::new(DemoGateway)
    } else {
        tracing::info!(
            "Using API key: {}... with model {}",
            config.api_key.chars().take(10).collect::<String>(),
            config.model
        );
        Arc::new(GeminiClient::new(&config))
    };

    let app = build_router(AppState::new(gateway));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
