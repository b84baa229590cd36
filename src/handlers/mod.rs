pub mod admin_auth;
pub mod classes;
pub mod health;
pub mod multipart;
pub mod notifications;
pub mod session_attachments;
pub mod sessions;
pub mod student_classes;
pub mod subjects;
pub mod teacher_subjects;
pub mod user_notifications;
pub mod users;

use crate::errors::ApiError;
use actix_web::{web, HttpRequest};
use log::debug;

/// Registers every resource group. Mounted under `/api/v1` by the server.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_check);
    users::configure(cfg);
    admin_auth::configure(cfg);
    classes::configure(cfg);
    subjects::configure(cfg);
    teacher_subjects::configure(cfg);
    student_classes::configure(cfg);
    sessions::configure(cfg);
    session_attachments::configure(cfg);
    notifications::configure(cfg);
    user_notifications::configure(cfg);
}

// Malformed input is reported with the same JSON error body as everything else.

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1024 * 1024)
        .error_handler(|err, req| {
            debug!("Rejected JSON body for {}: {}", req.path(), err);
            ApiError::ValidationError(format!("Invalid JSON body: {}", err)).into()
        })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req: &HttpRequest| {
        debug!("Rejected query string for {}: {}", req.path(), err);
        ApiError::ValidationError(format!("Invalid query parameters: {}", err)).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req: &HttpRequest| {
        debug!("Rejected path for {}: {}", req.path(), err);
        ApiError::ValidationError(format!("Invalid path parameter: {}", err)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App, HttpResponse};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Body {
        #[allow(dead_code)]
        name: String,
    }

    async fn echo(_: web::Json<Body>) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn by_id(_: web::Path<i32>) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn malformed_input_is_a_400_with_json_error() {
        let app = test::init_service(
            App::new()
                .app_data(json_config())
                .app_data(path_config())
                .route("/echo", web::post().to(echo))
                .route("/items/{id}", web::get().to(by_id)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/echo")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));

        let req = test::TestRequest::get().uri("/items/abc").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
