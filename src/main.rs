use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use church_api::config::AppConfig;
use church_api::database::connection::get_db_client;
use church_api::database::credentials::MongoCredentialStore;
use church_api::database::transactions::MongoTransactionLedger;
use church_api::routes;
use church_api::services::momo_gateway::MomoGateway;
use church_api::services::payment_service::{PaymentService, PaymentSettings};
use church_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let db = get_db_client().await;
    let app_state = initialize_app_state(db).await;

    let app = build_router(app_state).await;
    start_server(app).await;
}

async fn initialize_app_state(db: mongodb::Database) -> AppState {
    let mut app_state = AppState::new(db.clone());

    tracing::info!("🔧 Attempting to initialize MoMo payment service...");

    match AppConfig::from_env() {
        Ok(config) => {
            tracing::info!("✅ App config loaded successfully");
            tracing::info!("🌐 Environment: {}", config.momo_environment);
            tracing::info!(
                "🔑 Subscription keys configured: {}",
                config.momo_subscription_keys.len()
            );
            if config.has_static_credentials() {
                tracing::info!("🔐 Static API credentials supplied, provisioning disabled");
            }

            let gateway = Arc::new(MomoGateway::from_config(&config));
            let credentials = Arc::new(MongoCredentialStore::new(&db));
            let ledger = Arc::new(MongoTransactionLedger::new(&db));
            let payment_service = Arc::new(PaymentService::new(
                gateway,
                credentials,
                ledger,
                PaymentSettings::from_config(&config),
            ));

            app_state = app_state.with_payments(payment_service);
            tracing::info!("✅ MoMo payment service initialized and ready");
        }
        Err(e) => {
            tracing::error!("❌ Failed to load app config: {}", e);
            tracing::warn!("MoMo payment service will be disabled");
        }
    }

    app_state
}

async fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/payments", routes::payments::payment_routes())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router) {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(3000)));

    tracing::info!("🚀 Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            axum::serve(listener, app).await.unwrap();
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "⛪ Church Donations API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "momo": state.payment_service.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
