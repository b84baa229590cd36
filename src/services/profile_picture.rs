use crate::db::DbPool;
use crate::errors::{ApiError, ApiResult};
use crate::models::User;
use crate::services::attachment::{extension_of, UploadedFile};
use crate::services::UserService;
use crate::storage::{FileStore, PROFILE_PICTURES_DIR};
use log::{info, warn};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

const SIGNATURES: &[&[u8]] = &[
    b"\xff\xd8\xff",
    b"\x89PNG\r\n\x1a\n",
    b"GIF8",
    b"RIFF",
];

pub fn looks_like_image(data: &[u8]) -> bool {
    SIGNATURES.iter().any(|sig| data.starts_with(sig))
}

pub fn content_type_for(stored_name: &str) -> &'static str {
    match extension_of(stored_name).as_deref() {
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        Some(".png") => "image/png",
        Some(".gif") => "image/gif",
        Some(".webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Validates a picture and returns the name it will be stored under.
pub fn accept(file: &UploadedFile, max_bytes: usize) -> ApiResult<String> {
    let filename = file
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::ValidationError("Filename is required".to_string()))?;

    let extension = extension_of(filename)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            ApiError::UnsupportedMedia(
                "File type not allowed. Please upload JPG, PNG, GIF, or WebP images.".to_string(),
            )
        })?;

    if file.data.is_empty() {
        return Err(ApiError::ValidationError("File is empty".to_string()));
    }
    if file.data.len() > max_bytes {
        return Err(ApiError::UnsupportedMedia(format!(
            "File size exceeds maximum allowed size of {}MB",
            max_bytes / (1024 * 1024)
        )));
    }
    if !looks_like_image(&file.data) {
        return Err(ApiError::UnsupportedMedia("Invalid image file format".to_string()));
    }

    Ok(format!("profile_{}{}", Uuid::new_v4(), extension))
}

pub struct ProfilePictureService;

impl ProfilePictureService {
    /// Stores a new picture for the user and removes the one it replaces.
    pub async fn upload(
        user: &User,
        file: UploadedFile,
        max_bytes: usize,
        pool: &DbPool,
        store: &FileStore,
    ) -> ApiResult<User> {
        let stored_name = accept(&file, max_bytes)?;
        store.save(PROFILE_PICTURES_DIR, &stored_name, &file.data).await?;

        let updated = match UserService::set_profile_picture(user.id, Some(stored_name.clone()), pool).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(cleanup) = store.delete(PROFILE_PICTURES_DIR, &stored_name).await {
                    warn!("Could not remove orphaned picture {}: {}", stored_name, cleanup);
                }
                return Err(e);
            }
        };

        if let Some(previous) = &user.profile_picture {
            Self::remove_file(previous, store).await;
        }
        info!("Updated profile picture for user {}", user.id);
        Ok(updated)
    }

    pub async fn delete(user: &User, pool: &DbPool, store: &FileStore) -> ApiResult<User> {
        let previous = user
            .profile_picture
            .as_deref()
            .ok_or_else(|| ApiError::NotFoundError("No profile picture to delete".to_string()))?;
        let updated = UserService::set_profile_picture(user.id, None, pool).await?;
        Self::remove_file(previous, store).await;
        info!("Removed profile picture for user {}", user.id);
        Ok(updated)
    }

    /// Picture bytes and their content type.
    pub async fn fetch(user_id: i32, pool: &DbPool, store: &FileStore) -> ApiResult<(&'static str, Vec<u8>)> {
        let user = UserService::get(user_id, pool).await?;
        let stored_name = user
            .profile_picture
            .ok_or_else(|| ApiError::NotFoundError("Profile picture not found".to_string()))?;
        let bytes = store.read(PROFILE_PICTURES_DIR, &stored_name).await?;
        Ok((content_type_for(&stored_name), bytes))
    }

    async fn remove_file(stored_name: &str, store: &FileStore) {
        if let Err(e) = store.delete(PROFILE_PICTURES_DIR, stored_name).await {
            warn!("Failed to remove profile picture {}: {}", stored_name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn picture(name: &str, data: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: Some(name.to_string()),
            content_type: Some("image/png".to_string()),
            data: data.to_vec(),
        }
    }

    #[test]
    fn recognises_image_signatures() {
        assert!(looks_like_image(b"\xff\xd8\xff\xe0rest"));
        assert!(looks_like_image(PNG));
        assert!(looks_like_image(b"GIF89a"));
        assert!(looks_like_image(b"RIFF\0\0\0\0WEBP"));
        assert!(!looks_like_image(b"%PDF-1.4"));
        assert!(!looks_like_image(b""));
    }

    #[test]
    fn accepted_pictures_get_a_generated_name() {
        let name = accept(&picture("Me.PNG", PNG), 1024).unwrap();
        assert!(name.starts_with("profile_"));
        assert!(name.ends_with(".png"));
        assert!(!name.contains("Me"));
    }

    #[test]
    fn rejects_bad_pictures() {
        let err = accept(&picture("me.bmp", PNG), 1024).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));

        let err = accept(&picture("me.png", b"not an image"), 1024).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));

        let err = accept(&picture("me.png", PNG), 4).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));

        let err = accept(&picture("me.png", b""), 1024).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("profile_x.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("profile_x.webp"), "image/webp");
        assert_eq!(content_type_for("profile_x"), "application/octet-stream");
    }
}
