use crate::db::{self, DbPool};
use actix_web::{get, web, HttpResponse, Responder};
use diesel::connection::SimpleConnection;
use log::warn;
use serde_json::json;

#[get("/health")]
pub async fn health_check(pool: web::Data<DbPool>) -> impl Responder {
    let database = match db::run(&pool, |conn| Ok(conn.batch_execute("SELECT 1")?)).await {
        Ok(()) => "up",
        Err(e) => {
            warn!("Health check could not reach the database: {}", e);
            "down"
        }
    };
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
