use tokio::net::TcpListener;
use tracing::info;

use trainerhub::api::routes::create_routes;
use trainerhub::api::AppState;
use trainerhub::config::{AppConfig, DatabaseConfig, PaymentConfig, SmtpConfig, WhatsAppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    let database_config = DatabaseConfig::from_env()?;
    let smtp_config = SmtpConfig::from_env()?;
    let whatsapp_config = WhatsAppConfig::from_env()?;
    let payment_config = PaymentConfig::from_env()?;

    let db = database_config.create_pool().await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let state = AppState::new(
        db.clone(),
        config.clone(),
        smtp_config,
        whatsapp_config,
        payment_config,
    )?;

    // The scheduler handle must outlive the server for jobs to keep firing
    let _scheduler = state.scheduler(db).start().await?;

    let app = create_routes(state);

    let listener = TcpListener::bind(config.server_address()).await?;
    info!("TrainerHub server starting on http://{}", config.server_address());
    info!("Health check available at http://{}/health", config.server_address());

    axum::serve(listener, app).await?;

    Ok(())
}
