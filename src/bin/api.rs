use financial_tutor_backend::api::{start_server, ApiState};
use financial_tutor_backend::generation::GeminiModel;
use financial_tutor_backend::store::{
    DocumentStore, InMemoryDocumentStore, PostgresDocumentStore,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 Model calls will fail until it is configured");
        String::new()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Financial Tutor - API Server");
    info!("📍 Port: {}", api_port);

    let store = build_store();
    let model = Arc::new(GeminiModel::new(gemini_api_key));
    let state = ApiState::new(store, model);

    info!("✅ Tutor backend initialized");
    info!("📡 Starting API server...");

    start_server(state, api_port).await?;

    Ok(())
}

/// Postgres when a database URL is configured, in-memory otherwise.
fn build_store() -> Arc<dyn DocumentStore> {
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("POSTGRES_URL"))
        .ok();

    if let Some(url) = database_url {
        match PostgresDocumentStore::connect_lazy(&url) {
            Ok(store) => {
                info!("Document store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres document store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Document store backend: in-memory");
    Arc::new(InMemoryDocumentStore::new())
}
