use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{
    CreateSessionRequest, LatestQuery, NextSessionNumber, PageQuery, SessionListQuery,
    UpdateSessionRequest,
};
use crate::errors::ApiError;
use crate::services::SessionService;
use crate::storage::FileStore;
use actix_web::{delete, get, post, put, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/sessions")
            .service(create_session)
            .service(list_sessions)
            .service(upcoming)
            .service(stats)
            .service(next_number)
            .service(sessions_by_subject)
            .service(get_session)
            .service(session_attachments)
            .service(update_session)
            .service(delete_session),
    );
}

#[post("")]
async fn create_session(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let session = SessionService::create(body.into_inner(), &pool).await?;
    Ok(HttpResponse::Created().json(session))
}

#[get("")]
async fn list_sessions(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<SessionListQuery>,
) -> Result<HttpResponse, ApiError> {
    let sessions = SessionService::list(query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[get("/upcoming")]
async fn upcoming(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<LatestQuery>,
) -> Result<HttpResponse, ApiError> {
    let sessions = SessionService::upcoming(query.limit.unwrap_or(10), &pool).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[get("/stats")]
async fn stats(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let stats = SessionService::stats(&pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/subject/{subject_id}/next-number")]
async fn next_number(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let subject_id = path.into_inner();
    let next_session_no = SessionService::next_session_number(subject_id, &pool).await?;
    Ok(HttpResponse::Ok().json(NextSessionNumber {
        subject_id,
        next_session_no,
    }))
}

#[get("/subject/{subject_id}")]
async fn sessions_by_subject(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let sessions = SessionService::list_by_subject(path.into_inner(), query.page(), &pool).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[get("/{session_id}")]
async fn get_session(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let session = SessionService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(session))
}

#[get("/{session_id}/attachments")]
async fn session_attachments(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let session = SessionService::get_with_attachments(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(session))
}

#[put("/{session_id}")]
async fn update_session(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateSessionRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let session = SessionService::update(path.into_inner(), body.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(session))
}

#[delete("/{session_id}")]
async fn delete_session(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    SessionService::delete(path.into_inner(), &pool, &store).await?;
    Ok(HttpResponse::NoContent().finish())
}
