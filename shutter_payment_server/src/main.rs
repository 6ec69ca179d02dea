use log::*;
use shutter_payment_server::{config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    if config.database_url.is_empty() {
        error!("💻️ No database URL is configured. Set SPG_DATABASE_URL and restart.");
        std::process::exit(1);
    }
    match run_server(config).await {
        Ok(()) => info!("💻️ Server shut down cleanly."),
        Err(e) => {
            error!("💻️ Server terminated with an error: {e}");
            std::process::exit(1);
        },
    }
}
