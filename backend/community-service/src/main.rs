use std::io;

use community_service::{startup, Config};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // A missing .env file is fine; real deployments use the environment
    let _ = dotenvy::dotenv();

    startup::init_logging();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    startup::run(config).await
}
