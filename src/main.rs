use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use loanbook::config::{Config, DatabaseConfig, StorageBackend};
use loanbook::loans::{self, InMemoryLoanStore, LoanService, LoanStore, MySqlLoanStore};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env before the subscriber so LOG_LEVEL is honoured
    dotenvy::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

    // Initialize tracing; RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("loanbook={},actix_web=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()
        .and_then(|config| config.validate().map(|_| config))
        .map_err(|e| {
            tracing::error!(error = %e, "Configuration rejected");
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?;

    tracing::info!("Starting loanbook");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let store = build_store(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize loan storage");
        std::io::Error::other(e.to_string())
    })?;

    let service = web::Data::new(LoanService::with_defaults(store));

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(service.clone())
            .configure(loans::controllers::configure)
            .route("/health", web::get().to(health_check))
            .route("/", web::get().to(index))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await
}

async fn build_store(config: &Config) -> loanbook::core::Result<Arc<dyn LoanStore>> {
    match (config.app.storage, &config.database) {
        (StorageBackend::Mysql, Some(database)) => {
            let pool = database.create_pool().await?;
            tracing::info!(
                "Database pool initialized ({} connections)",
                database.pool_size
            );

            DatabaseConfig::migrate(&pool).await?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(MySqlLoanStore::new(pool)))
        }
        (StorageBackend::Mysql, None) => Err(loanbook::core::AppError::Configuration(
            "MySQL storage requires DATABASE_URL".to_string(),
        )),
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using in-memory storage, loans are lost on restart");
            Ok(Arc::new(InMemoryLoanStore::new()))
        }
    }
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "loanbook"
    }))
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "loanbook",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
