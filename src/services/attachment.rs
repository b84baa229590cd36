use crate::db::{self, DbPool};
use crate::dto::{
    AttachmentStats, AttachmentWithUploader, ContentTypeCount, Page, RenameAttachmentRequest,
    SessionAttachmentList,
};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewSessionAttachment, SessionAttachment};
use crate::schema::{session_attachments, sessions, users};
use crate::storage::{FileStore, ATTACHMENTS_DIR};
use diesel::dsl::{count, exists, sum};
use diesel::prelude::*;
use log::{error, info, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::Path;
use uuid::Uuid;

const OCTET_STREAM: &str = "application/octet-stream";

/// Accepted extensions and the MIME types browsers send for them.
/// The first MIME type is the canonical one.
const ALLOWED: &[(&str, &[&str])] = &[
    (".pdf", &["application/pdf"]),
    (".doc", &["application/msword"]),
    (
        ".docx",
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    (".ppt", &["application/vnd.ms-powerpoint"]),
    (
        ".pptx",
        &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
    ),
    (".xls", &["application/vnd.ms-excel"]),
    (
        ".xlsx",
        &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
    (".txt", &["text/plain"]),
    (".rtf", &["application/rtf", "text/rtf"]),
    (".jpg", &["image/jpeg", "image/jpg", "image/pjpeg"]),
    (".jpeg", &["image/jpeg", "image/jpg", "image/pjpeg"]),
    (".png", &["image/png"]),
    (".gif", &["image/gif"]),
    (".zip", &["application/zip", "application/x-zip-compressed"]),
    (
        ".rar",
        &["application/vnd.rar", "application/x-rar-compressed", "application/x-rar"],
    ),
    (".mp4", &["video/mp4"]),
    (".avi", &["video/x-msvideo", "video/avi"]),
    (".mov", &["video/quicktime"]),
    (".mp3", &["audio/mpeg", "audio/mp3"]),
    (".wav", &["audio/wav", "audio/x-wav", "audio/wave"]),
];

/// A file part read from a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Lower-cased extension including the leading dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Drops MIME parameters such as `; charset=utf-8`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Name, type and size rules for session attachments.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentPolicy {
    max_bytes: usize,
}

/// What an accepted upload will be stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub filename: String,
    pub extension: String,
    pub content_type: String,
}

impl AttachmentPolicy {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn too_large(&self) -> ApiError {
        ApiError::UnsupportedMedia(format!(
            "File size exceeds maximum allowed size of {} MB",
            self.max_bytes / (1024 * 1024)
        ))
    }

    /// Checks the declared name and content type before any bytes are kept.
    pub fn check_declared(&self, filename: Option<&str>, content_type: Option<&str>) -> ApiResult<Accepted> {
        let filename = filename
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::ValidationError("No filename provided".to_string()))?;

        let (extension, mimes) = extension_of(filename)
            .and_then(|ext| {
                ALLOWED
                    .iter()
                    .find(|(allowed, _)| *allowed == ext)
                    .map(|(_, mimes)| (ext, *mimes))
            })
            .ok_or_else(|| {
                let list: Vec<&str> = ALLOWED.iter().map(|(ext, _)| *ext).collect();
                ApiError::UnsupportedMedia(format!(
                    "File type not allowed. Allowed types: {}",
                    list.join(", ")
                ))
            })?;

        let declared = content_type.map(essence).filter(|c| !c.is_empty());
        let content_type = match declared {
            Some(c) if c == OCTET_STREAM => mimes[0].to_string(),
            Some(c) => {
                let known = ALLOWED
                    .iter()
                    .any(|(_, allowed)| allowed.contains(&c.as_str()));
                if !known {
                    return Err(ApiError::UnsupportedMedia(format!(
                        "Content type {} is not allowed",
                        c
                    )));
                }
                c
            }
            None => mimes[0].to_string(),
        };

        Ok(Accepted {
            filename: filename.to_string(),
            extension,
            content_type,
        })
    }

    pub fn check_size(&self, size: usize) -> ApiResult<()> {
        if size == 0 {
            return Err(ApiError::ValidationError("File is empty".to_string()));
        }
        if size > self.max_bytes {
            return Err(self.too_large());
        }
        Ok(())
    }

    pub fn check(&self, file: &UploadedFile) -> ApiResult<Accepted> {
        let accepted = self.check_declared(file.filename.as_deref(), file.content_type.as_deref())?;
        self.check_size(file.data.len())?;
        Ok(accepted)
    }
}

/// Storage name independent of the declared file name.
pub fn storage_name(extension: &str) -> String {
    format!("{}{}", Uuid::new_v4(), extension)
}

fn not_found() -> ApiError {
    ApiError::NotFoundError("Attachment not found".to_string())
}

fn session_not_found() -> ApiError {
    ApiError::NotFoundError("Session not found".to_string())
}

type UploaderRow = (SessionAttachment, Option<String>, Option<String>);

fn with_uploader((attachment, uploader_name, uploader_email): UploaderRow) -> AttachmentWithUploader {
    AttachmentWithUploader {
        attachment,
        uploader_name,
        uploader_email,
    }
}

pub struct AttachmentService;

impl AttachmentService {
    pub async fn upload(
        session_id: i32,
        uploaded_by: i32,
        file: UploadedFile,
        policy: AttachmentPolicy,
        pool: &DbPool,
        store: &FileStore,
    ) -> ApiResult<SessionAttachment> {
        let session_exists = db::run(pool, move |conn| {
            Ok(diesel::select(exists(sessions::table.find(session_id))).get_result::<bool>(conn)?)
        })
        .await?;
        if !session_exists {
            return Err(session_not_found());
        }

        let accepted = policy.check(&file)?;
        let stored_name = storage_name(&accepted.extension);
        store.save(ATTACHMENTS_DIR, &stored_name, &file.data).await?;

        let row = NewSessionAttachment {
            session_id,
            filename: accepted.filename,
            stored_name: stored_name.clone(),
            file_size: file.data.len() as i64,
            content_type: accepted.content_type,
            uploaded_by: Some(uploaded_by),
        };
        let inserted = db::run(pool, move |conn| {
            Ok(diesel::insert_into(session_attachments::table)
                .values(&row)
                .get_result::<SessionAttachment>(conn)?)
        })
        .await;

        match inserted {
            Ok(attachment) => {
                info!(
                    "Stored attachment {} ({} bytes) for session {}",
                    attachment.id, attachment.file_size, session_id
                );
                Ok(attachment)
            }
            Err(e) => {
                error!("Attachment insert failed, removing {}: {}", stored_name, e);
                if let Err(cleanup) = store.delete(ATTACHMENTS_DIR, &stored_name).await {
                    warn!("Could not remove orphaned file {}: {}", stored_name, cleanup);
                }
                Err(e)
            }
        }
    }

    pub async fn get(attachment_id: i32, pool: &DbPool) -> ApiResult<AttachmentWithUploader> {
        db::run(pool, move |conn| {
            let row = session_attachments::table
                .left_join(users::table)
                .filter(session_attachments::id.eq(attachment_id))
                .select((
                    session_attachments::all_columns,
                    users::name.nullable(),
                    users::email.nullable(),
                ))
                .first::<UploaderRow>(conn)
                .optional()?
                .ok_or_else(not_found)?;
            Ok(with_uploader(row))
        })
        .await
    }

    pub async fn list_by_session(session_id: i32, pool: &DbPool) -> ApiResult<SessionAttachmentList> {
        db::run(pool, move |conn| {
            if !diesel::select(exists(sessions::table.find(session_id))).get_result::<bool>(conn)? {
                return Err(session_not_found());
            }
            let attachments = session_attachments::table
                .filter(session_attachments::session_id.eq(session_id))
                .order((session_attachments::created_at.asc(), session_attachments::id.asc()))
                .load::<SessionAttachment>(conn)?;
            let total_size = attachments.iter().map(|a| a.file_size).sum();
            Ok(SessionAttachmentList {
                session_id,
                total_count: attachments.len(),
                total_size,
                attachments,
            })
        })
        .await
    }

    pub async fn list_by_uploader(user_id: i32, page: Page, pool: &DbPool) -> ApiResult<Vec<AttachmentWithUploader>> {
        let rows = db::run(pool, move |conn| {
            Ok(session_attachments::table
                .left_join(users::table)
                .filter(session_attachments::uploaded_by.eq(user_id))
                .select((
                    session_attachments::all_columns,
                    users::name.nullable(),
                    users::email.nullable(),
                ))
                .order((session_attachments::created_at.desc(), session_attachments::id.desc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<UploaderRow>(conn)?)
        })
        .await?;
        Ok(rows.into_iter().map(with_uploader).collect())
    }

    /// Changes the declared name only; the stored file keeps its name.
    pub async fn rename(
        attachment_id: i32,
        req: RenameAttachmentRequest,
        pool: &DbPool,
    ) -> ApiResult<SessionAttachment> {
        req.validate()?;
        let filename = req.filename.trim().to_string();
        db::run(pool, move |conn| {
            diesel::update(session_attachments::table.find(attachment_id))
                .set(session_attachments::filename.eq(filename))
                .get_result::<SessionAttachment>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn download(
        attachment_id: i32,
        pool: &DbPool,
        store: &FileStore,
    ) -> ApiResult<(SessionAttachment, Vec<u8>)> {
        let attachment = db::run(pool, move |conn| {
            session_attachments::table
                .find(attachment_id)
                .first::<SessionAttachment>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await?;
        let bytes = store.read(ATTACHMENTS_DIR, &attachment.stored_name).await?;
        Ok((attachment, bytes))
    }

    pub async fn stats(pool: &DbPool) -> ApiResult<AttachmentStats> {
        db::run(pool, move |conn| {
            let total_attachments = session_attachments::table.count().get_result::<i64>(conn)?;
            let total_size_bytes = session_attachments::table
                .select(sum(session_attachments::file_size))
                .first::<Option<Decimal>>(conn)?
                .and_then(|d| d.to_i64())
                .unwrap_or(0);
            let by_content_type = session_attachments::table
                .group_by(session_attachments::content_type)
                .select((
                    session_attachments::content_type,
                    count(session_attachments::id),
                ))
                .order(count(session_attachments::id).desc())
                .load::<ContentTypeCount>(conn)?;
            let total_size_mb = (total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
            Ok(AttachmentStats {
                total_attachments,
                total_size_bytes,
                total_size_mb,
                by_content_type,
            })
        })
        .await
    }

    /// Removes the backing file, then the row. A file that is already gone
    /// does not block the delete; any other I/O failure keeps the row.
    pub async fn delete(attachment_id: i32, pool: &DbPool, store: &FileStore) -> ApiResult<()> {
        let attachment = db::run(pool, move |conn| {
            session_attachments::table
                .find(attachment_id)
                .first::<SessionAttachment>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await?;

        if !store.delete(ATTACHMENTS_DIR, &attachment.stored_name).await.map_err(|e| {
            error!("Failed to remove file {}: {}", attachment.stored_name, e);
            e
        })? {
            warn!(
                "Attachment {} had no file on disk ({})",
                attachment.id, attachment.stored_name
            );
        }

        db::run(pool, move |conn| {
            let removed = diesel::delete(session_attachments::table.find(attachment_id)).execute(conn)?;
            if removed == 0 {
                return Err(not_found());
            }
            Ok(())
        })
        .await?;
        info!("Deleted attachment {} from session {}", attachment.id, attachment.session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    fn file(name: Option<&str>, content_type: Option<&str>, len: usize) -> UploadedFile {
        UploadedFile {
            filename: name.map(String::from),
            content_type: content_type.map(String::from),
            data: vec![b'x'; len],
        }
    }

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of("Report.PDF").as_deref(), Some(".pdf"));
        assert_eq!(extension_of("archive.tar.zip").as_deref(), Some(".zip"));
        assert_eq!(extension_of("README"), None);
    }

    #[test]
    fn accepts_every_listed_extension() {
        let policy = AttachmentPolicy::new(50 * MB);
        for (ext, mimes) in ALLOWED {
            let name = format!("file{}", ext);
            let accepted = policy
                .check(&file(Some(&name), None, 10))
                .unwrap_or_else(|e| panic!("{} rejected: {}", ext, e));
            assert_eq!(accepted.content_type, mimes[0]);
            assert_eq!(&accepted.extension, ext);
        }
    }

    #[test]
    fn rejects_disallowed_extension_with_415() {
        let policy = AttachmentPolicy::new(50 * MB);
        for name in ["virus.exe", "script.sh", "noextension", "page.html"] {
            let err = policy.check(&file(Some(name), None, 10)).unwrap_err();
            assert!(matches!(err, ApiError::UnsupportedMedia(_)), "{}", name);
        }
    }

    #[test]
    fn rejects_unknown_declared_content_type() {
        let policy = AttachmentPolicy::new(50 * MB);
        let err = policy
            .check(&file(Some("notes.txt"), Some("text/html"), 10))
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));
    }

    #[test]
    fn octet_stream_falls_back_to_extension_type() {
        let policy = AttachmentPolicy::new(50 * MB);
        let accepted = policy
            .check(&file(Some("slides.pptx"), Some("application/octet-stream"), 10))
            .unwrap();
        assert_eq!(
            accepted.content_type,
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let policy = AttachmentPolicy::new(50 * MB);
        let accepted = policy
            .check(&file(Some("a.txt"), Some("Text/Plain; charset=utf-8"), 3))
            .unwrap();
        assert_eq!(accepted.content_type, "text/plain");
    }

    #[test]
    fn size_limits() {
        let policy = AttachmentPolicy::new(MB);
        assert!(policy.check(&file(Some("a.pdf"), None, MB)).is_ok());

        let err = policy.check(&file(Some("a.pdf"), None, MB + 1)).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));

        let err = policy.check(&file(Some("a.pdf"), None, 0)).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn missing_filename_is_a_validation_error() {
        let policy = AttachmentPolicy::new(MB);
        for name in [None, Some(""), Some("   ")] {
            let err = policy.check(&file(name, None, 5)).unwrap_err();
            assert!(matches!(err, ApiError::ValidationError(_)));
        }
    }

    #[test]
    fn storage_name_ignores_declared_name() {
        let a = storage_name(".pdf");
        let b = storage_name(".pdf");
        assert_ne!(a, b);
        assert!(a.ends_with(".pdf"));
        assert_eq!(a.len(), 36 + 4);
        assert!(!a.contains('/'));
    }
}
