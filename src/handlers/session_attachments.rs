use crate::auth::{Access, AuthUser};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::dto::{PageQuery, RenameAttachmentRequest, SessionUploadQuery, UploadResult};
use crate::errors::ApiError;
use crate::handlers::multipart::{read_files, read_single_file, FilePart, Oversize, MAX_BULK_FILES};
use crate::services::{AttachmentPolicy, AttachmentService};
use crate::storage::FileStore;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{delete, get, post, put, web, HttpResponse};
use log::info;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/session-attachments")
            .service(upload)
            .service(bulk_upload)
            .service(by_session)
            .service(by_uploader)
            .service(stats)
            .service(get_attachment)
            .service(download)
            .service(rename)
            .service(delete_attachment),
    );
}

fn policy(config: &AppConfig) -> AttachmentPolicy {
    AttachmentPolicy::new(config.max_attachment_bytes())
}

#[post("/upload")]
async fn upload(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    store: web::Data<FileStore>,
    auth: AuthUser,
    query: web::Query<SessionUploadQuery>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let policy = policy(&config);
    let file = read_single_file(payload, policy.max_bytes(), || policy.too_large()).await?;
    let attachment =
        AttachmentService::upload(query.session_id, auth.id(), file, policy, &pool, &store).await?;
    Ok(HttpResponse::Created().json(UploadResult {
        success: true,
        filename: attachment.filename.clone(),
        attachment: Some(attachment),
        error: None,
    }))
}

/// Stores each file independently and reports one result per file.
#[post("/bulk-upload")]
async fn bulk_upload(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    store: web::Data<FileStore>,
    auth: AuthUser,
    query: web::Query<SessionUploadQuery>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let policy = policy(&config);
    let parts = read_files(
        payload,
        policy.max_bytes(),
        MAX_BULK_FILES,
        Oversize::Skip,
        || policy.too_large(),
    )
    .await?;
    if parts.is_empty() {
        return Err(ApiError::ValidationError("No files provided".to_string()));
    }

    let mut results = Vec::with_capacity(parts.len());
    for part in parts {
        let result = match part {
            FilePart::Received(file) => {
                let filename = file.filename.clone().unwrap_or_default();
                match AttachmentService::upload(query.session_id, auth.id(), file, policy, &pool, &store).await {
                    Ok(attachment) => UploadResult {
                        success: true,
                        filename,
                        attachment: Some(attachment),
                        error: None,
                    },
                    Err(e) => UploadResult {
                        success: false,
                        filename,
                        attachment: None,
                        error: Some(e.message().to_string()),
                    },
                }
            }
            FilePart::TooLarge { filename } => UploadResult {
                success: false,
                filename: filename.unwrap_or_default(),
                attachment: None,
                error: Some(policy.too_large().message().to_string()),
            },
        };
        results.push(result);
    }
    info!(
        "Bulk upload to session {}: {} of {} files stored",
        query.session_id,
        results.iter().filter(|r| r.success).count(),
        results.len()
    );
    Ok(HttpResponse::Ok().json(results))
}

#[get("/session/{session_id}")]
async fn by_session(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let list = AttachmentService::list_by_session(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(list))
}

#[get("/user/{user_id}")]
async fn by_uploader(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let rows = AttachmentService::list_by_uploader(path.into_inner(), query.page(), &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/stats")]
async fn stats(pool: web::Data<DbPool>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let stats = AttachmentService::stats(&pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/{attachment_id}")]
async fn get_attachment(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let attachment = AttachmentService::get(path.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(attachment))
}

#[get("/{attachment_id}/download")]
async fn download(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let (attachment, bytes) = AttachmentService::download(path.into_inner(), &pool, &store).await?;
    Ok(HttpResponse::Ok()
        .content_type(attachment.content_type.as_str())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(attachment.filename.clone())],
        })
        .body(bytes))
}

#[put("/{attachment_id}")]
async fn rename(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<RenameAttachmentRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    let attachment = AttachmentService::rename(path.into_inner(), body.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(attachment))
}

#[delete("/{attachment_id}")]
async fn delete_attachment(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    auth.require(Access::TeacherOrAdmin)?;
    AttachmentService::delete(path.into_inner(), &pool, &store).await?;
    Ok(HttpResponse::NoContent().finish())
}
