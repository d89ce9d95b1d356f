use dotenvy::dotenv;
use envconfig::Envconfig;
use tokio::net::TcpListener;

use pharmora::{config::Config, create_app, db::init_db, services::schedule_stock_alerts, AppState};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize the logger with default settings or "info" level if not specified
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting the Pharmora server...");

    // Load environment variables from a .env file if present
    dotenv().ok();

    let config = Config::init_from_env()?;

    let pool = init_db(config.connect_options()?, config.db_max_connections).await?;

    if let Err(e) = schedule_stock_alerts(pool.clone(), &config.stock_alert_schedule).await {
        log::error!("Stock alerts disabled: {}", e);
    }

    let app = create_app(
        AppState::new(pool),
        &config.cors_origin_list(),
        &config.images_dir,
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("Listening on http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
    }
}
