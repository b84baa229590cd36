use crate::auth::{Access, AuthUser};
use crate::db::DbPool;
use crate::dto::{CreateClassRequest, MessageResponse, PageQuery, SearchQuery, UpdateClassRequest};
use crate::errors::ApiError;
use crate::services::ClassService;
use actix_web::{delete, get, post, put, web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/classes")
            .service(create_class)
            .service(list_classes)
            .service(search_classes)
            .service(get_class)
            .service(update_class)
            .service(delete_class),
    );
}

#[post("")]
async fn create_class(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<CreateClassRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    body.validate()?;
    let class = ClassService::create(&body.name, &pool).await?;
    Ok(HttpResponse::Created().json(class))
}

#[get("")]
async fn list_classes(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let classes = ClassService::list(query.page(), &pool).await?;
    Ok(HttpResponse::Ok().json(classes))
}

#[get("/search")]
async fn search_classes(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let classes = ClassService::search(query.term(1)?, &pool).await?;
    Ok(HttpResponse::Ok().json(classes))
}

#[get("/{class_id}")]
async fn get_class(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let class = ClassService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(class))
}

#[put("/{class_id}")]
async fn update_class(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateClassRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    body.validate()?;
    let class = ClassService::update(path.into_inner(), body.into_inner().name, &pool).await?;
    Ok(HttpResponse::Ok().json(class))
}

#[delete("/{class_id}")]
async fn delete_class(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    ClassService::delete(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Class deleted successfully")))
}
