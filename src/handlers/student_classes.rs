use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{
    BulkEnrollManyRequest, BulkEnrollRequest, CountResponse, EnrollRequest, MessageResponse,
    StudentClassQuery,
};
use crate::errors::ApiError;
use crate::services::StudentClassService;
use actix_web::{delete, get, post, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/student-classes")
            .service(enroll)
            .service(bulk_enroll)
            .service(bulk_enroll_many)
            .service(list_enrollments)
            .service(students)
            .service(classes)
            .service(student_with_classes)
            .service(class_with_students)
            .service(unenroll)
            .service(remove_all_for_student)
            .service(remove_all_for_class)
            .service(get_enrollment)
            .service(remove_enrollment),
    );
}

#[post("/enroll")]
async fn enroll(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<EnrollRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let row = StudentClassService::enroll(body.student_id, body.class_id, &pool).await?;
    Ok(HttpResponse::Created().json(row))
}

#[post("/bulk-enroll")]
async fn bulk_enroll(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<BulkEnrollRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    body.validate()?;
    let req = body.into_inner();
    let rows = StudentClassService::bulk_enroll(req.student_id, req.class_ids, &pool).await?;
    Ok(HttpResponse::Created().json(rows))
}

#[post("/bulk-enroll-multiple")]
async fn bulk_enroll_many(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<BulkEnrollManyRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    body.validate()?;
    let requested = body.enrollments.len();
    let count = StudentClassService::bulk_enroll_many(body.into_inner().enrollments, &pool).await?;
    Ok(HttpResponse::Created().json(CountResponse {
        success: true,
        count,
        message: format!("Created {} of {} requested enrollments", count, requested),
    }))
}

#[get("")]
async fn list_enrollments(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<StudentClassQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let rows = StudentClassService::list(query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/students")]
async fn students(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let students = StudentClassService::students(&pool).await?;
    Ok(HttpResponse::Ok().json(students))
}

#[get("/classes")]
async fn classes(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let classes = StudentClassService::classes(&pool).await?;
    Ok(HttpResponse::Ok().json(classes))
}

#[get("/student/{student_id}")]
async fn student_with_classes(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let details = StudentClassService::student_with_classes(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[get("/class/{class_id}")]
async fn class_with_students(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let details = StudentClassService::class_with_students(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[delete("/unenroll/{student_id}/{class_id}")]
async fn unenroll(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let (student_id, class_id) = path.into_inner();
    StudentClassService::unenroll(student_id, class_id, &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Student unenrolled from class")))
}

#[delete("/student/{student_id}/all")]
async fn remove_all_for_student(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let student_id = path.into_inner();
    let count = StudentClassService::remove_all_for_student(student_id, &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Removed {} enrollments of student {}", count, student_id),
    }))
}

#[delete("/class/{class_id}/all")]
async fn remove_all_for_class(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let class_id = path.into_inner();
    let count = StudentClassService::remove_all_for_class(class_id, &pool).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        success: true,
        count,
        message: format!("Removed {} enrollments from class {}", count, class_id),
    }))
}

#[get("/{enrollment_id}")]
async fn get_enrollment(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let row = StudentClassService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/{enrollment_id}")]
async fn remove_enrollment(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    StudentClassService::remove(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Enrollment removed")))
}
