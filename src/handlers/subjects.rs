use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{
    CreateSubjectRequest, MessageResponse, Page, SearchQuery, SubjectListQuery, UpdateSubjectRequest,
};
use crate::errors::ApiError;
use crate::services::SubjectService;
use actix_web::{delete, get, post, put, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subjects")
            .service(create_subject)
            .service(list_subjects)
            .service(search_subjects)
            .service(subjects_by_class)
            .service(get_subject)
            .service(update_subject)
            .service(delete_subject),
    );
}

#[post("")]
async fn create_subject(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<CreateSubjectRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let subject = SubjectService::create(body.into_inner(), &pool).await?;
    Ok(HttpResponse::Created().json(subject))
}

#[get("")]
async fn list_subjects(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<SubjectListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = Page::new(query.skip, query.limit);
    let subjects = SubjectService::list(query.class_id, page, &pool).await?;
    Ok(HttpResponse::Ok().json(subjects))
}

#[get("/search")]
async fn search_subjects(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let subjects = SubjectService::search(query.term(1)?, &pool).await?;
    Ok(HttpResponse::Ok().json(subjects))
}

#[get("/class/{class_id}")]
async fn subjects_by_class(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let subjects = SubjectService::list_by_class(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(subjects))
}

#[get("/{subject_id}")]
async fn get_subject(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let subject = SubjectService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(subject))
}

#[put("/{subject_id}")]
async fn update_subject(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateSubjectRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let subject = SubjectService::update(path.into_inner(), body.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(subject))
}

#[delete("/{subject_id}")]
async fn delete_subject(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    SubjectService::delete(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Subject deleted successfully")))
}
