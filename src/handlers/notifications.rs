use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{
    BulkCreateNotificationRequest, CleanupQuery, CountResponse, CreateNotificationRequest,
    LatestQuery, MessageResponse, NotificationListQuery, PageQuery, SearchQuery,
    UpdateNotificationRequest,
};
use crate::errors::ApiError;
use crate::models::NotificationType;
use crate::services::NotificationService;
use actix_web::{delete, get, post, put, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .service(create_notification)
            .service(bulk_create)
            .service(list_notifications)
            .service(latest)
            .service(by_type)
            .service(search)
            .service(stats)
            .service(delete_by_type)
            .service(cleanup)
            .service(get_notification)
            .service(update_notification)
            .service(delete_notification),
    );
}

#[post("")]
async fn create_notification(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<CreateNotificationRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let notification = NotificationService::create(body.into_inner(), &pool).await?;
    Ok(HttpResponse::Created().json(notification))
}

#[post("/bulk")]
async fn bulk_create(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<BulkCreateNotificationRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let created = NotificationService::bulk_create(body.into_inner().notifications, &pool).await?;
    Ok(HttpResponse::Created().json(created))
}

#[get("")]
async fn list_notifications(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<NotificationListQuery>,
) -> Result<HttpResponse, ApiError> {
    let list = NotificationService::list(query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(list))
}

#[get("/latest")]
async fn latest(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<LatestQuery>,
) -> Result<HttpResponse, ApiError> {
    let notifications = NotificationService::latest(query.limit.unwrap_or(10), &pool).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[get("/by-type/{notification_type}")]
async fn by_type(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<NotificationType>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let notifications = NotificationService::by_type(path.into_inner(), query.page(), &pool).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[get("/search")]
async fn search(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    term: web::Query<SearchQuery>,
    page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let notifications = NotificationService::search(term.term(2)?, page.page(), &pool).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[get("/stats")]
async fn stats(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let stats = NotificationService::stats(&pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[delete("/by-type/{notification_type}")]
async fn delete_by_type(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<NotificationType>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let kind = path.into_inner();
    let count = NotificationService::delete_by_type(kind, &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Deleted {} {} notifications", count, kind),
    }))
}

#[delete("/cleanup/old")]
async fn cleanup(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<CleanupQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let days = query.days()?;
    let count = NotificationService::delete_older_than(days, &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Deleted {} notifications older than {} days", count, days),
    }))
}

#[get("/{notification_id}")]
async fn get_notification(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let notification = NotificationService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[put("/{notification_id}")]
async fn update_notification(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateNotificationRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let notification =
        NotificationService::update(path.into_inner(), body.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[delete("/{notification_id}")]
async fn delete_notification(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    NotificationService::delete(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Notification deleted successfully")))
}
