//! Database-backed checks. Set `TEST_DATABASE_URL` to a disposable Postgres
//! database to run them; they are skipped otherwise.

use actix_web::{test, web, App};
use diesel::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

use eduspace::db::{create_pool, init_schema};
use eduspace::dto::{
    CreateNotificationRequest, CreateSessionRequest, CreateSubjectRequest, RegisterRequest,
};
use eduspace::models::{User, UserNotification};
use eduspace::schema::{student_classes, user_notifications};
use eduspace::services::{
    AttachmentPolicy, AttachmentService, ClassService, DeliveryOutcome, DeliveryService,
    DeliveryTarget, NotificationService, SessionService, StudentClassService, SubjectService,
    UploadedFile, UserService,
};
use eduspace::storage::ATTACHMENTS_DIR;
use eduspace::{handlers, ApiError, AppConfig, DbPool, FileStore};

fn test_pool() -> Option<DbPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    init_schema(&url).expect("schema");
    Some(create_pool(&url, 4).expect("pool"))
}

fn test_config(upload_dir: PathBuf) -> AppConfig {
    AppConfig {
        database_url: String::new(),
        host: "127.0.0.1".to_string(),
        port: 0,
        workers: 1,
        db_pool_size: 4,
        jwt_secret: "integration-secret".to_string(),
        jwt_expiry_minutes: 30,
        upload_dir,
        max_attachment_mb: 1,
        max_profile_picture_mb: 1,
        allowed_origins: vec![],
    }
}

fn register_request(role: &str) -> RegisterRequest {
    serde_json::from_value(json!({
        "name": "Test User",
        "password": "password123",
        "email": format!("{}@example.test", Uuid::new_v4().simple()),
        "role": role,
    }))
    .expect("register request")
}

async fn student(pool: &DbPool) -> User {
    UserService::register(register_request("student"), pool)
        .await
        .expect("register student")
}

async fn notification(pool: &DbPool) -> i32 {
    let req: CreateNotificationRequest =
        serde_json::from_value(json!({ "title": "Exam schedule" })).expect("notification request");
    NotificationService::create(req, pool).await.expect("create notification").id
}

fn delivery_rows(pool: &DbPool, user_id: i32) -> Vec<UserNotification> {
    let mut conn = pool.get().expect("connection");
    user_notifications::table
        .filter(user_notifications::user_id.eq(user_id))
        .load(&mut conn)
        .expect("load deliveries")
}

#[actix_web::test]
async fn duplicate_email_is_a_conflict() {
    let Some(pool) = test_pool() else { return };
    let req = register_request("teacher");
    UserService::register(req.clone(), &pool).await.expect("first registration");

    let err = UserService::register(req, &pool).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "{:?}", err);
}

#[actix_web::test]
async fn deleting_a_user_cascades_to_memberships_and_deliveries() {
    let Some(pool) = test_pool() else { return };
    let user = student(&pool).await;
    let class = ClassService::create(&format!("Class {}", Uuid::new_v4().simple()), &pool)
        .await
        .expect("create class");
    StudentClassService::enroll(user.id, class.id, &pool)
        .await
        .expect("enroll");
    let notification_id = notification(&pool).await;
    DeliveryService::deliver(notification_id, DeliveryTarget::Users(vec![user.id]), &pool)
        .await
        .expect("deliver");

    UserService::delete(user.id, &pool).await.expect("delete user");

    let mut conn = pool.get().expect("connection");
    let memberships: i64 = student_classes::table
        .filter(student_classes::student_id.eq(user.id))
        .count()
        .get_result(&mut conn)
        .expect("count memberships");
    assert_eq!(memberships, 0);
    assert!(delivery_rows(&pool, user.id).is_empty());
    ClassService::get(class.id, &pool).await.expect("class survives");
}

#[actix_web::test]
async fn delivering_twice_creates_one_row() {
    let Some(pool) = test_pool() else { return };
    let user = student(&pool).await;
    let notification_id = notification(&pool).await;

    let first = DeliveryService::deliver(notification_id, DeliveryTarget::Users(vec![user.id, user.id]), &pool)
        .await
        .expect("first delivery");
    let second = DeliveryService::deliver(notification_id, DeliveryTarget::Users(vec![user.id]), &pool)
        .await
        .expect("second delivery");

    match (first, second) {
        (DeliveryOutcome::Delivered(a), DeliveryOutcome::Delivered(b)) => {
            assert_eq!(a.assigned(), 1);
            assert_eq!(b.assigned(), 0);
            assert_eq!(b.skipped, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(delivery_rows(&pool, user.id).len(), 1);
}

#[actix_web::test]
async fn mark_read_keeps_first_read_time() {
    let Some(pool) = test_pool() else { return };
    let user = student(&pool).await;
    let notification_id = notification(&pool).await;
    DeliveryService::deliver(notification_id, DeliveryTarget::Users(vec![user.id]), &pool)
        .await
        .expect("deliver");

    assert!(DeliveryService::mark_read(user.id, notification_id, &pool).await.expect("mark"));
    let first = delivery_rows(&pool, user.id)[0].read_at;
    assert!(first.is_some());

    assert!(!DeliveryService::mark_read(user.id, notification_id, &pool).await.expect("mark again"));
    assert_eq!(delivery_rows(&pool, user.id)[0].read_at, first);

    let err = DeliveryService::mark_read(user.id, notification_id + 1_000_000, &pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFoundError(_)));
}

#[actix_web::test]
async fn register_login_and_fetch_profile() {
    let Some(pool) = test_pool() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path().to_path_buf());
    let store = FileStore::new(dir.path().to_path_buf());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config))
            .app_data(web::Data::new(store))
            .app_data(handlers::json_config())
            .service(web::scope("/api/v1").configure(handlers::configure)),
    )
    .await;

    let email = format!("{}@example.test", Uuid::new_v4().simple());
    let req = test::TestRequest::post()
        .uri("/api/v1/users/register")
        .set_json(json!({ "name": "Rina", "password": "password123", "email": email }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .set_json(json!({ "identifier": email, "password": "wrong-password" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .set_json(json!({ "identifier": email, "password": "password123" }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let token = body["access_token"].as_str().expect("token").to_string();

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let me: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "student");

    let req = test::TestRequest::get().uri("/api/v1/users/me").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn login_accepts_the_email_as_registered() {
    let Some(pool) = test_pool() else { return };
    let email = format!("Alice.{}@School.ID", Uuid::new_v4().simple());
    let req: RegisterRequest = serde_json::from_value(json!({
        "name": "Alice",
        "password": "password123",
        "email": email,
    }))
    .expect("register request");
    let user = UserService::register(req, &pool).await.expect("register");
    assert_eq!(user.email.as_deref(), Some(email.to_lowercase().as_str()));

    let found = UserService::authenticate(&email, "password123", &pool)
        .await
        .expect("login with registered casing");
    assert_eq!(found.id, user.id);
    let found = UserService::authenticate(&format!("  {}  ", email.to_uppercase()), "password123", &pool)
        .await
        .expect("login with other casing");
    assert_eq!(found.id, user.id);
}

#[actix_web::test]
async fn attachment_row_survives_a_failed_file_removal() {
    let Some(pool) = test_pool() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileStore::new(dir.path().to_path_buf());
    store.ensure_dirs().await.expect("dirs");

    let uploader = UserService::register(register_request("teacher"), &pool)
        .await
        .expect("register teacher");
    let class = ClassService::create(&format!("Class {}", Uuid::new_v4().simple()), &pool)
        .await
        .expect("create class");
    let subject_req: CreateSubjectRequest =
        serde_json::from_value(json!({ "name": "Biology", "class_id": class.id })).expect("subject");
    let subject = SubjectService::create(subject_req, &pool).await.expect("create subject");
    let tomorrow = chrono::Local::now().date_naive() + chrono::Duration::days(1);
    let session_req: CreateSessionRequest = serde_json::from_value(json!({
        "subject_id": subject.id,
        "session_no": 1,
        "date": tomorrow,
    }))
    .expect("session");
    let session = SessionService::create(session_req, &pool).await.expect("create session");

    let file = UploadedFile {
        filename: Some("notes.pdf".to_string()),
        content_type: Some("application/pdf".to_string()),
        data: b"%PDF-1.4".to_vec(),
    };
    let attachment = AttachmentService::upload(
        session.id,
        uploader.id,
        file,
        AttachmentPolicy::new(1024 * 1024),
        &pool,
        &store,
    )
    .await
    .expect("upload");

    // A directory in place of the file makes removal fail with something other than NotFound.
    let stored = dir.path().join(ATTACHMENTS_DIR).join(&attachment.stored_name);
    std::fs::remove_file(&stored).expect("remove file");
    std::fs::create_dir(&stored).expect("create blocking dir");

    assert!(AttachmentService::delete(attachment.id, &pool, &store).await.is_err());
    AttachmentService::get(attachment.id, &pool).await.expect("row kept");

    std::fs::remove_dir(&stored).expect("remove blocking dir");
    AttachmentService::delete(attachment.id, &pool, &store)
        .await
        .expect("delete with file already absent");
    let err = AttachmentService::get(attachment.id, &pool).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFoundError(_)));
}
