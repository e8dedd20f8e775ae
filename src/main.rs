use arkgen::config::Config;
use arkgen::{logger, server};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logger::init_from_service_config(&config.log) {
        eprintln!("Failed to initialize logger: {}", e);
        std::process::exit(1);
    }

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    logger::log_startup_info(
        &config.app.name,
        &config.app.version,
        &config.app.environment,
        config.server.port,
    );

    server::run(config).await
}
