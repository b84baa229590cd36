use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{debug, error, warn};
use serde_json::json;
use thiserror::Error;

// Custom error handling
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Authentication error: {0}")]
    AuthError(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn message(&self) -> &str {
        match self {
            ApiError::DatabaseError(msg)
            | ApiError::ValidationError(msg)
            | ApiError::AuthError(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFoundError(msg)
            | ApiError::Conflict(msg)
            | ApiError::UnsupportedMedia(msg)
            | ApiError::InternalError(msg) => msg,
        }
    }

    /// Maps a diesel failure, turning constraint violations into the
    /// caller-facing variants. `conflict_msg` is used for unique violations.
    pub fn from_diesel(e: DieselError, conflict_msg: &str) -> Self {
        match e {
            DieselError::NotFound => ApiError::NotFoundError("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                debug!("Unique violation: {}", info.message());
                ApiError::Conflict(conflict_msg.to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                debug!("Foreign key violation: {}", info.message());
                ApiError::NotFoundError("Referenced record not found".to_string())
            }
            other => {
                error!("Database query failed: {}", other);
                ApiError::DatabaseError(other.to_string())
            }
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(e: DieselError) -> Self {
        ApiError::from_diesel(e, "Record already exists")
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        error!("Failed to get database connection: {}", e);
        ApiError::DatabaseError(e.to_string())
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        error!("Database operation error: {}", e);
        ApiError::DatabaseError(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        error!("File store error: {}", e);
        ApiError::InternalError("File storage failure".to_string())
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(e: bcrypt::BcryptError) -> Self {
        error!("Password hashing failed: {}", e);
        ApiError::InternalError("Failed to process password".to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        debug!("Rejected token: {}", e);
        ApiError::AuthError("Could not validate credentials".to_string())
    }
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        ApiError::ValidationError(format!("Malformed multipart body: {}", e))
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let msg = self.message();
        match self {
            ApiError::DatabaseError(_) => {
                error!("\x1B[1;31mDATABASE ERROR:\x1B[0m {}", msg);
            }
            ApiError::InternalError(_) => {
                error!("\x1B[1;31mINTERNAL SERVER ERROR:\x1B[0m {}", msg);
            }
            ApiError::ValidationError(_) => {
                warn!("\x1B[1;33mVALIDATION ERROR:\x1B[0m {}", msg);
            }
            ApiError::AuthError(_) => {
                warn!("\x1B[1;33mAUTHENTICATION ERROR:\x1B[0m {}", msg);
            }
            ApiError::Forbidden(_) => {
                warn!("\x1B[1;33mFORBIDDEN:\x1B[0m {}", msg);
            }
            ApiError::UnsupportedMedia(_) => {
                warn!("\x1B[1;33mREJECTED UPLOAD:\x1B[0m {}", msg);
            }
            ApiError::NotFoundError(_) | ApiError::Conflict(_) => {
                debug!("\x1B[1;36m{}:\x1B[0m {}", self.status_code(), msg);
            }
        }

        let mut builder = HttpResponse::build(self.status_code());
        if let ApiError::AuthError(_) = self {
            builder.insert_header(("WWW-Authenticate", "Bearer"));
        }
        builder.json(json!({ "error": msg }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFoundError(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        let cases = [
            (ApiError::ValidationError("x".into()), 400),
            (ApiError::AuthError("x".into()), 401),
            (ApiError::Forbidden("x".into()), 403),
            (ApiError::NotFoundError("x".into()), 404),
            (ApiError::Conflict("x".into()), 409),
            (ApiError::UnsupportedMedia("x".into()), 415),
            (ApiError::DatabaseError("x".into()), 500),
            (ApiError::InternalError("x".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status_code().as_u16(), code, "{:?}", err);
        }
    }

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err = ApiError::from(DieselError::NotFound);
        assert!(matches!(err, ApiError::NotFoundError(_)));
    }

    #[actix_web::test]
    async fn error_body_is_json_with_message() {
        let resp = ApiError::Conflict("Email already exists".into()).error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Email already exists");
    }

    #[test]
    fn auth_error_advertises_bearer_scheme() {
        let resp = ApiError::AuthError("Could not validate credentials".into()).error_response();
        assert_eq!(resp.headers().get("WWW-Authenticate").unwrap(), "Bearer");
    }
}
