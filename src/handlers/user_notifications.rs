use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{
    AssignAllRequest, AssignByRoleRequest, AssignRequest, BulkAssignRequest,
    BulkAssignmentResponse, BulkReadResponse, CountResponse, InboxQuery, MarkReadRequest,
    MessageResponse, RecipientsQuery,
};
use crate::errors::ApiError;
use crate::services::{DeliveryOutcome, DeliveryService, DeliveryTarget, NotificationService, UserService};
use actix_web::{delete, get, post, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user-notifications")
            .service(assign)
            .service(bulk_assign)
            .service(assign_by_role)
            .service(assign_all)
            .service(my_notifications)
            .service(user_stats)
            .service(user_inbox)
            .service(recipients)
            .service(mark_many_read)
            .service(mark_all_read)
            .service(mark_read)
            .service(my_stats)
            .service(remove_own)
            .service(remove_for_user)
            .service(remove_all_for_user),
    );
}

fn delivered(outcome: DeliveryOutcome) -> HttpResponse {
    let response = BulkAssignmentResponse::from(outcome);
    if response.success {
        HttpResponse::Created().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

#[post("/assign")]
async fn assign(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<AssignRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let req = body.into_inner();
    let outcome =
        DeliveryService::deliver(req.notification_id, DeliveryTarget::Users(req.user_ids), &pool).await?;
    Ok(delivered(outcome))
}

#[post("/bulk-assign")]
async fn bulk_assign(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<BulkAssignRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let req = body.into_inner();
    let report = DeliveryService::bulk_deliver(req.notification_ids, req.user_ids, &pool).await?;
    Ok(delivered(DeliveryOutcome::Delivered(report)))
}

#[post("/assign-by-role")]
async fn assign_by_role(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<AssignByRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let req = body.into_inner();
    let outcome =
        DeliveryService::deliver(req.notification_id, DeliveryTarget::Roles(req.roles), &pool).await?;
    Ok(delivered(outcome))
}

#[post("/assign-all")]
async fn assign_all(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<AssignAllRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let outcome = DeliveryService::deliver(body.notification_id, DeliveryTarget::AllUsers, &pool).await?;
    Ok(delivered(outcome))
}

#[get("/my-notifications")]
async fn my_notifications(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<InboxQuery>,
) -> Result<HttpResponse, ApiError> {
    let inbox = DeliveryService::inbox(auth.id(), query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(inbox))
}

#[get("/user/{user_id}/stats")]
async fn user_stats(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let user = UserService::get(path.into_inner(), &pool).await?;
    let stats = DeliveryService::stats(user.id, &pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/user/{user_id}")]
async fn user_inbox(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<InboxQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let user = UserService::get(path.into_inner(), &pool).await?;
    let inbox = DeliveryService::inbox(user.id, query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(inbox))
}

#[get("/notification/{notification_id}/recipients")]
async fn recipients(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<RecipientsQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let notification = NotificationService::get(path.into_inner(), &pool).await?;
    let rows = DeliveryService::recipients(notification.id, query.is_read, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/mark-read")]
async fn mark_many_read(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<MarkReadRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let (marked, already) =
        DeliveryService::mark_many_read(auth.id(), body.into_inner().notification_ids, &pool).await?;
    Ok(HttpResponse::Ok().json(BulkReadResponse {
        success: true,
        marked_read_count: marked,
        already_read_count: already,
        message: format!("Marked {} notifications as read, {} were already read", marked, already),
    }))
}

#[post("/mark-all-read")]
async fn mark_all_read(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let count = DeliveryService::mark_all_read(auth.id(), &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Marked {} notifications as read", count),
    }))
}

#[post("/{notification_id}/read")]
async fn mark_read(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let newly_read = DeliveryService::mark_read(auth.id(), path.into_inner(), &pool).await?;
    let message = if newly_read {
        "Notification marked as read"
    } else {
        "Notification was already read"
    };
    Ok(HttpResponse::Ok().json(MessageResponse::ok(message)))
}

#[get("/my-stats")]
async fn my_stats(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let stats = DeliveryService::stats(auth.id(), &pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[delete("/remove/{notification_id}")]
async fn remove_own(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    DeliveryService::remove(auth.id(), path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Notification removed")))
}

#[delete("/user/{user_id}/notification/{notification_id}")]
async fn remove_for_user(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let (user_id, notification_id) = path.into_inner();
    DeliveryService::remove(user_id, notification_id, &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Notification removed from user")))
}

#[delete("/user/{user_id}/all")]
async fn remove_all_for_user(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let user_id = path.into_inner();
    let count = DeliveryService::remove_all_for_user(user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Removed {} notifications from user {}", count, user_id),
    }))
}
