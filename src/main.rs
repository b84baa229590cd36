use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::{error, info};
use std::io;

use eduspace::config::AppConfig;
use eduspace::db::{create_pool, init_schema};
use eduspace::handlers;
use eduspace::logger::setup_logger;
use eduspace::middleware::RequestLogger;
use eduspace::storage::FileStore;

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, e);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .expose_headers(vec!["x-request-id"])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    setup_logger();

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    config
        .validate()
        .map_err(|e| startup_error("Invalid configuration", e))?;

    info!("Initializing database schema");
    init_schema(&config.database_url).map_err(|e| startup_error("Database initialization failed", e))?;
    let pool = create_pool(&config.database_url, config.db_pool_size)
        .map_err(|e| startup_error("Failed to create database connection pool", e))?;
    info!("Database ready (pool size {})", config.db_pool_size);

    let store = FileStore::new(config.upload_dir.clone());
    store
        .ensure_dirs()
        .await
        .map_err(|e| startup_error("Failed to prepare upload directories", e))?;
    info!("Storing uploads under {}", store.root().display());

    let host = config.host.clone();
    let port = config.port;
    let workers = config.workers;
    info!("Starting HTTP server at http://{}:{}/api/v1", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&config.allowed_origins))
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .app_data(handlers::path_config())
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .workers(workers)
    .keep_alive(std::time::Duration::from_secs(75))
    .shutdown_timeout(30)
    .bind((host, port))?
    .run()
    .await
}
