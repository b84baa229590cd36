use crate::auth::{Access, AuthService, AuthUser};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::dto::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    UpdateProfileRequest, UpdateStatusRequest, UpdateUserRequest, UserListQuery,
};
use crate::errors::ApiError;
use crate::handlers::multipart::read_single_file;
use crate::services::{ProfilePictureService, UserService};
use crate::storage::{FileStore, PROFILE_PICTURES_DIR};
use actix_multipart::Multipart;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use log::{debug, info, warn};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(register)
            .service(login)
            .service(me)
            .service(update_me)
            .service(change_password)
            .service(upload_profile_picture)
            .service(delete_profile_picture)
            .service(list_users)
            .service(profile_picture)
            .service(get_user)
            .service(update_user)
            .service(update_status)
            .service(delete_user),
    );
}

#[post("/register")]
async fn register(
    pool: web::Data<DbPool>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = UserService::register(body.into_inner(), &pool).await?;
    Ok(HttpResponse::Created().json(user))
}

#[post("/login")]
async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    debug!("Login attempt for {}", body.identifier);
    let user = UserService::authenticate(&body.identifier, &body.password, &pool).await?;
    let access_token = AuthService::generate_token(&user, &config)?;
    info!("User {} logged in", user.id);
    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

#[get("/me")]
async fn me(auth: AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(auth.user))
}

#[put("/me")]
async fn update_me(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    req.validate()?;
    let user = UserService::update(auth.id(), req.into_changeset(), &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[post("/me/change-password")]
async fn change_password(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    UserService::change_password(&auth.user, &body.current_password, &body.new_password, &pool).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Password changed successfully")))
}

#[post("/me/profile-picture")]
async fn upload_profile_picture(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    store: web::Data<FileStore>,
    auth: AuthUser,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let max_bytes = config.max_profile_picture_bytes();
    let file = read_single_file(payload, max_bytes, || {
        ApiError::UnsupportedMedia(format!(
            "File size exceeds maximum allowed size of {}MB",
            config.max_profile_picture_mb
        ))
    })
    .await?;
    let user = ProfilePictureService::upload(&auth.user, file, max_bytes, &pool, &store).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[delete("/me/profile-picture")]
async fn delete_profile_picture(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    auth: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let user = ProfilePictureService::delete(&auth.user, &pool, &store).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[get("/{user_id}/profile-picture")]
async fn profile_picture(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let (content_type, bytes) = ProfilePictureService::fetch(path.into_inner(), &pool, &store).await?;
    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}

#[get("")]
async fn list_users(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let users = UserService::list(query.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/{user_id}")]
async fn get_user(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let user = UserService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/{user_id}")]
async fn update_user(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let req = body.into_inner();
    req.validate()?;
    let user = UserService::update(path.into_inner(), req.into_changeset(), &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[patch("/{user_id}/status")]
async fn update_status(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let user = UserService::update_status(path.into_inner(), body.status, &pool).await?;
    info!("User {} status set to {} by admin {}", user.id, user.status, auth.id());
    Ok(HttpResponse::Ok().json(user))
}

#[delete("/{user_id}")]
async fn delete_user(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::AdminOnly)?;
    let user = UserService::delete(path.into_inner(), &pool).await?;
    if let Some(picture) = &user.profile_picture {
        if let Err(e) = store.delete(PROFILE_PICTURES_DIR, picture).await {
            warn!("Failed to remove profile picture of deleted user {}: {}", user.id, e);
        }
    }
    Ok(HttpResponse::Ok().json(MessageResponse::ok("User deleted successfully")))
}
