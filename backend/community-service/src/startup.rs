/// Process bootstrap: logging, keys, database, shared state and the HTTP server
use actix_cors::Cors;
use actix_middleware::{CorrelationIdMiddleware, MetricsMiddleware};
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::io;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AuthConfig, Config, CorsConfig, SERVICE_NAME};
use crate::db::MIGRATOR;
use crate::media::MediaStore;
use crate::routes;
use crate::security::jwt;
use crate::services::EmailService;
use crate::websocket::ConnectionRegistry;

const DEFAULT_LOG_FILTER: &str = "info,actix_web=info,sqlx=warn";

/// Install the global subscriber; `LOG_FORMAT=json` switches to JSON lines
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

pub fn init_jwt(auth: &AuthConfig) -> anyhow::Result<()> {
    jwt::initialize_jwt_keys(&auth.private_key_pem, &auth.public_key_pem)
}

/// Connect and, unless `RUN_MIGRATIONS=false`, bring the schema up to date
pub async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    config.database.log_config();
    let pool = db_pool::create_pool(config.database.clone()).await?;

    let run_migrations = std::env::var("RUN_MIGRATIONS")
        .map(|v| !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);
    if run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

pub fn cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default();
    for origin in config.allowed_origins.split(',') {
        let origin = origin.trim();
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else if !origin.is_empty() {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allow_any_method().allow_any_header().max_age(3600)
}

/// Handles shared by every worker
#[derive(Clone)]
pub struct AppState {
    pub pool: web::Data<PgPool>,
    pub config: web::Data<Config>,
    pub media: web::Data<MediaStore>,
    pub registry: web::Data<ConnectionRegistry>,
    pub email: web::Data<EmailService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool: web::Data::new(pool),
            config: web::Data::new(config.clone()),
            media: web::Data::new(MediaStore::new(&config.media)),
            registry: web::Data::new(ConnectionRegistry::new()),
            email: web::Data::new(EmailService::new(
                config.email.from.clone(),
                config.email.site_url.clone(),
            )),
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.pool.clone())
            .app_data(self.config.clone())
            .app_data(self.media.clone())
            .app_data(self.registry.clone())
            .app_data(self.email.clone());
    }
}

fn to_io(err: anyhow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{err:#}"))
}

pub async fn run(config: Config) -> io::Result<()> {
    tracing::info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    init_jwt(&config.auth).map_err(to_io)?;
    let pool = connect_database(&config).await.map_err(to_io)?;
    tokio::fs::create_dir_all(&config.media.root).await?;

    let state = AppState::new(pool, &config);
    let cors_config = config.cors.clone();
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Listening on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .configure(|cfg| state.register(cfg))
            .wrap(cors(&cors_config))
            .wrap(MetricsMiddleware)
            .wrap(CorrelationIdMiddleware)
            .wrap(TracingLogger::default())
            .configure(routes::configure)
    })
    .bind(&bind_address)?
    .shutdown_timeout(30)
    .run();

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        handle.stop(true).await;
    });

    server.await
}

pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}
