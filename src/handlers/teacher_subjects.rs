use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{
    AssignTeacherRequest, BulkAssignTeacherRequest, CountResponse, MessageResponse,
    TeacherSubjectQuery,
};
use crate::errors::ApiError;
use crate::services::TeacherSubjectService;
use actix_web::{delete, get, post, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/teacher-subjects")
            .service(assign)
            .service(bulk_assign)
            .service(list_assignments)
            .service(teachers)
            .service(teacher_with_subjects)
            .service(subject_with_teachers)
            .service(unassign)
            .service(remove_all_for_teacher)
            .service(get_assignment)
            .service(remove_assignment),
    );
}

#[post("/assign")]
async fn assign(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<AssignTeacherRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let row = TeacherSubjectService::assign(body.teacher_id, body.subject_id, &pool).await?;
    Ok(HttpResponse::Created().json(row))
}

#[post("/bulk-assign")]
async fn bulk_assign(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<BulkAssignTeacherRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    body.validate()?;
    let req = body.into_inner();
    let rows = TeacherSubjectService::bulk_assign(req.teacher_id, req.subject_ids, &pool).await?;
    Ok(HttpResponse::Created().json(rows))
}

#[get("")]
async fn list_assignments(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<TeacherSubjectQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let rows = TeacherSubjectService::list(query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/teachers")]
async fn teachers(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let teachers = TeacherSubjectService::teachers(&pool).await?;
    Ok(HttpResponse::Ok().json(teachers))
}

#[get("/teacher/{teacher_id}")]
async fn teacher_with_subjects(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let details = TeacherSubjectService::teacher_with_subjects(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[get("/subject/{subject_id}")]
async fn subject_with_teachers(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let details = TeacherSubjectService::subject_with_teachers(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[delete("/unassign/{teacher_id}/{subject_id}")]
async fn unassign(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let (teacher_id, subject_id) = path.into_inner();
    TeacherSubjectService::unassign(teacher_id, subject_id, &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Teacher unassigned from subject")))
}

#[delete("/teacher/{teacher_id}/all")]
async fn remove_all_for_teacher(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let teacher_id = path.into_inner();
    let count = TeacherSubjectService::remove_all_for_teacher(teacher_id, &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Removed {} assignments of teacher {}", count, teacher_id),
    }))
}

#[get("/{assignment_id}")]
async fn get_assignment(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let row = TeacherSubjectService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/{assignment_id}")]
async fn remove_assignment(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    TeacherSubjectService::remove(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Assignment removed")))
}
