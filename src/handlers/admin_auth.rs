use crate::auth::{Access, AuthUser};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::dto::{AdminLogQuery, AdminLoginRequest, AdminLogoutRequest, MessageResponse};
use crate::errors::ApiError;
use crate::services::{AdminAuthService, ClientInfo};
use actix_web::{get, http::header, post, web, HttpRequest, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin-auth")
            .service(login)
            .service(logout)
            .service(logs)
            .service(active_sessions)
            .service(force_logout)
            .service(verify_session),
    );
}

fn client_info(req: &HttpRequest) -> ClientInfo {
    ClientInfo {
        ip_address: req.connection_info().realip_remote_addr().map(|s| s.to_owned()),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_owned()),
    }
}

#[post("/login")]
async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    body: web::Json<AdminLoginRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let response = AdminAuthService::login(body.into_inner(), client_info(&req), &config, &pool).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/logout")]
async fn logout(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<AdminLogoutRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    AdminAuthService::logout(body.session_id, auth.id(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Logged out successfully")))
}

#[get("/logs")]
async fn logs(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<AdminLogQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let logs = AdminAuthService::logs(query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(logs))
}

#[get("/active-sessions")]
async fn active_sessions(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let sessions = AdminAuthService::active_sessions(&pool).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[post("/force-logout/{session_id}")]
async fn force_logout(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let session_id = path.into_inner();
    AdminAuthService::force_logout(session_id, &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok(format!(
        "Session {} logged out",
        session_id
    ))))
}

#[get("/verify-session")]
async fn verify_session(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let status = AdminAuthService::verify_session(auth.id(), auth.token.clone(), &pool).await?;
    Ok(HttpResponse::Ok().json(status))
}
