use crate::errors::{ApiError, ApiResult};
use crate::models::*;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::Queryable;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const MAX_DELIVERY_USERS: usize = 1000;
pub const MAX_DELIVERY_NOTIFICATIONS: usize = 100;
pub const MAX_BULK_NOTIFICATIONS: usize = 50;
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 1000;

// Validation helpers
fn check_len(field: &str, value: &str, min: usize, max: usize) -> ApiResult<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(ApiError::ValidationError(format!(
            "{} must be at least {} characters long",
            field, min
        )));
    }
    if len > max {
        return Err(ApiError::ValidationError(format!(
            "{} must be at most {} characters long",
            field, max
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ApiResult<()> {
    let invalid = || ApiError::ValidationError(format!("Invalid email address: {}", email));
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

fn validate_password(field: &str, password: &str) -> ApiResult<()> {
    if password.chars().count() < 8 {
        return Err(ApiError::ValidationError(format!(
            "{} must be at least 8 characters long",
            field
        )));
    }
    Ok(())
}

fn validate_student_number(student_number: Option<&str>) -> ApiResult<()> {
    match student_number {
        Some(value) => check_len("Student number", value, 5, 50),
        None => Ok(()),
    }
}

/// Removes duplicates while keeping the first occurrence order.
pub fn dedup_ids(ids: &[i32]) -> Vec<i32> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn check_id_list(field: &str, ids: &[i32], max: usize) -> ApiResult<()> {
    if ids.is_empty() {
        return Err(ApiError::ValidationError(format!(
            "At least one {} must be provided",
            field
        )));
    }
    if ids.len() > max {
        return Err(ApiError::ValidationError(format!(
            "Cannot use more than {} {}s at once",
            max, field
        )));
    }
    Ok(())
}

/// Offset/limit pair clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Page {
            offset: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    pub q: String,
}

impl SearchQuery {
    pub fn term(&self, min: usize) -> ApiResult<String> {
        let term = self.q.trim();
        if term.chars().count() < min {
            return Err(ApiError::ValidationError(format!(
                "Search term must be at least {} characters long",
                min
            )));
        }
        Ok(term.to_string())
    }
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        MessageResponse {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CountResponse {
    pub success: bool,
    pub count: usize,
    pub message: String,
}

// Users
#[derive(Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub student_number: Option<String>,
    pub password: String,
    pub name: String,
    pub role: Option<UserRole>,
    pub grade: Option<Grade>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub religion: Option<String>,
    pub birth_place: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_len("Name", &self.name, 1, 100)?;
        validate_password("Password", &self.password)?;
        validate_student_number(self.student_number.as_deref())?;
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if self.role == Some(UserRole::Admin) {
            return Err(ApiError::ValidationError(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    /// E-mail address or student number.
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct UpdateProfileRequest {
    pub student_number: Option<String>,
    pub name: Option<String>,
    pub grade: Option<Grade>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub religion: Option<String>,
    pub birth_place: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(name) = &self.name {
            check_len("Name", name, 1, 100)?;
        }
        validate_student_number(self.student_number.as_deref())?;
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    pub fn into_changeset(self) -> UserChangeset {
        UserChangeset {
            student_number: self.student_number,
            name: self.name.map(|n| n.trim().to_string()),
            grade: self.grade,
            gender: self.gender,
            email: self.email,
            region: self.region,
            date_of_birth: self.date_of_birth,
            religion: self.religion,
            birth_place: self.birth_place,
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    pub profile: UpdateProfileRequest,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.profile.validate()
    }

    pub fn into_changeset(self) -> UserChangeset {
        UserChangeset {
            role: self.role,
            status: self.status,
            ..self.profile.into_changeset()
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> ApiResult<()> {
        validate_password("New password", &self.new_password)
    }
}

#[derive(Deserialize, Debug)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

#[derive(Deserialize, Debug, Default)]
pub struct UserListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<UserRole>,
    pub grade: Option<Grade>,
    pub status: Option<UserStatus>,
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct PersonSummary {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub id: i32,
    pub name: String,
    pub student_number: Option<String>,
    pub grade: Option<Grade>,
}

impl From<&User> for PersonSummary {
    fn from(user: &User) -> Self {
        PersonSummary {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&User> for StudentSummary {
    fn from(user: &User) -> Self {
        StudentSummary {
            id: user.id,
            name: user.name.clone(),
            student_number: user.student_number.clone(),
            grade: user.grade,
        }
    }
}

// Admin sessions
#[derive(Deserialize, Debug)]
pub struct AdminLoginRequest {
    pub email: String,
    /// Name of the person operating the shared admin account.
    pub name: String,
    pub password: String,
}

impl AdminLoginRequest {
    pub fn validate(&self) -> ApiResult<()> {
        validate_email(&self.email)?;
        check_len("Name", &self.name, 2, 100)
    }
}

#[derive(Serialize, Debug)]
pub struct AdminLoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub admin_user_id: i32,
    pub admin_name: String,
    pub login_time: NaiveDateTime,
    pub session_id: i32,
}

#[derive(Deserialize, Debug)]
pub struct AdminLogoutRequest {
    pub session_id: i32,
}

#[derive(Deserialize, Debug, Default)]
pub struct AdminLogQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub admin_user_id: Option<i32>,
    pub admin_name: Option<String>,
    pub active_only: Option<bool>,
}

#[derive(Serialize, Debug)]
pub struct AdminSessionStatus {
    pub valid: bool,
    pub admin_user_id: i32,
    pub session: Option<AdminLoginLog>,
}

// Classes
#[derive(Deserialize, Debug)]
pub struct CreateClassRequest {
    pub name: String,
}

impl CreateClassRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_len("Class name", &self.name, 2, 100)
    }
}

#[derive(Deserialize, Debug)]
pub struct UpdateClassRequest {
    pub name: Option<String>,
}

impl UpdateClassRequest {
    pub fn validate(&self) -> ApiResult<()> {
        match &self.name {
            Some(name) => check_len("Class name", name, 2, 100),
            None => Ok(()),
        }
    }
}

// Subjects
#[derive(Deserialize, Debug)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub class_id: i32,
}

impl CreateSubjectRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_len("Subject name", &self.name, 2, 100)
    }
}

#[derive(Deserialize, Debug)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub class_id: Option<i32>,
}

impl UpdateSubjectRequest {
    pub fn validate(&self) -> ApiResult<()> {
        match &self.name {
            Some(name) => check_len("Subject name", name, 2, 100),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct SubjectListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub class_id: Option<i32>,
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct SubjectWithClass {
    pub id: i32,
    pub name: String,
    pub class_id: i32,
    pub class_name: String,
}

// Teacher assignments
#[derive(Deserialize, Debug)]
pub struct AssignTeacherRequest {
    pub teacher_id: i32,
    pub subject_id: i32,
}

#[derive(Deserialize, Debug)]
pub struct BulkAssignTeacherRequest {
    pub teacher_id: i32,
    pub subject_ids: Vec<i32>,
}

impl BulkAssignTeacherRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_id_list("subject ID", &self.subject_ids, MAX_DELIVERY_NOTIFICATIONS)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct TeacherSubjectQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub teacher_id: Option<i32>,
    pub subject_id: Option<i32>,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct TeacherSubjectDetails {
    pub id: i32,
    pub teacher_id: i32,
    pub teacher_name: String,
    pub subject_id: i32,
    pub subject_name: String,
    pub class_id: i32,
    pub class_name: String,
}

#[derive(Serialize, Debug)]
pub struct TeacherWithSubjects {
    pub teacher: PersonSummary,
    pub subjects: Vec<SubjectWithClass>,
}

#[derive(Serialize, Debug)]
pub struct SubjectWithTeachers {
    pub subject: SubjectWithClass,
    pub teachers: Vec<PersonSummary>,
}

// Enrollments
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct EnrollRequest {
    pub student_id: i32,
    pub class_id: i32,
}

#[derive(Deserialize, Debug)]
pub struct BulkEnrollRequest {
    pub student_id: i32,
    pub class_ids: Vec<i32>,
}

impl BulkEnrollRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_id_list("class ID", &self.class_ids, MAX_DELIVERY_NOTIFICATIONS)
    }
}

#[derive(Deserialize, Debug)]
pub struct BulkEnrollManyRequest {
    pub enrollments: Vec<EnrollRequest>,
}

impl BulkEnrollManyRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.enrollments.is_empty() {
            return Err(ApiError::ValidationError(
                "At least one enrollment must be provided".to_string(),
            ));
        }
        if self.enrollments.len() > MAX_DELIVERY_USERS {
            return Err(ApiError::ValidationError(format!(
                "Cannot enroll more than {} pairs at once",
                MAX_DELIVERY_USERS
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct StudentClassQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub student_id: Option<i32>,
    pub class_id: Option<i32>,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct StudentClassDetails {
    pub id: i32,
    pub student_id: i32,
    pub student_name: String,
    pub student_number: Option<String>,
    pub class_id: i32,
    pub class_name: String,
}

#[derive(Serialize, Debug)]
pub struct StudentWithClasses {
    pub student: StudentSummary,
    pub classes: Vec<ClassRoom>,
}

#[derive(Serialize, Debug)]
pub struct ClassWithStudents {
    pub class: ClassRoom,
    pub students: Vec<StudentSummary>,
}

// Sessions
#[derive(Deserialize, Debug)]
pub struct CreateSessionRequest {
    pub subject_id: i32,
    pub session_no: i32,
    pub date: NaiveDate,
}

impl CreateSessionRequest {
    pub fn validate(&self, today: NaiveDate) -> ApiResult<()> {
        if self.session_no <= 0 {
            return Err(ApiError::ValidationError(
                "Session number must be positive".to_string(),
            ));
        }
        if self.date < today {
            return Err(ApiError::ValidationError(
                "Session date cannot be in the past".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct UpdateSessionRequest {
    pub subject_id: Option<i32>,
    pub session_no: Option<i32>,
    pub date: Option<NaiveDate>,
}

impl UpdateSessionRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if matches!(self.session_no, Some(n) if n <= 0) {
            return Err(ApiError::ValidationError(
                "Session number must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct SessionListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub subject_id: Option<i32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct SessionListResponse {
    pub sessions: Vec<Session>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct SessionWithSubject {
    pub id: i32,
    pub subject_id: i32,
    pub session_no: i32,
    pub date: NaiveDate,
    pub subject_name: String,
    pub class_id: i32,
    pub class_name: String,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct SubjectSessionCount {
    pub subject_id: i32,
    pub subject_name: String,
    pub count: i64,
}

#[derive(Serialize, Debug)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub sessions_by_subject: Vec<SubjectSessionCount>,
    pub upcoming_sessions: i64,
    pub today_sessions: i64,
}

#[derive(Serialize, Debug)]
pub struct SessionWithAttachments {
    #[serde(flatten)]
    pub session: Session,
    pub attachments: Vec<SessionAttachment>,
}

#[derive(Serialize, Debug)]
pub struct NextSessionNumber {
    pub subject_id: i32,
    pub next_session_no: i32,
}

// Attachments
#[derive(Serialize, Debug, Clone)]
pub struct AttachmentWithUploader {
    #[serde(flatten)]
    pub attachment: SessionAttachment,
    pub uploader_name: Option<String>,
    pub uploader_email: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SessionAttachmentList {
    pub session_id: i32,
    pub attachments: Vec<SessionAttachment>,
    pub total_count: usize,
    pub total_size: i64,
}

#[derive(Deserialize, Debug)]
pub struct SessionUploadQuery {
    pub session_id: i32,
}

#[derive(Deserialize, Debug)]
pub struct RenameAttachmentRequest {
    pub filename: String,
}

impl RenameAttachmentRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_len("Filename", &self.filename, 1, 255)
    }
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct ContentTypeCount {
    pub content_type: String,
    pub count: i64,
}

#[derive(Serialize, Debug)]
pub struct AttachmentStats {
    pub total_attachments: i64,
    pub total_size_bytes: i64,
    pub total_size_mb: f64,
    pub by_content_type: Vec<ContentTypeCount>,
}

#[derive(Serialize, Debug)]
pub struct UploadResult {
    pub success: bool,
    pub filename: String,
    pub attachment: Option<SessionAttachment>,
    pub error: Option<String>,
}

// Notifications
#[derive(Deserialize, Debug, Clone)]
pub struct CreateNotificationRequest {
    pub title: String,
    pub description: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub nominal: Option<Decimal>,
    pub event_date: Option<NaiveDateTime>,
}

fn check_nominal(nominal: Option<Decimal>) -> ApiResult<()> {
    match nominal {
        Some(value) if value.is_sign_negative() => Err(ApiError::ValidationError(
            "Nominal cannot be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

impl CreateNotificationRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_len("Title", &self.title, 3, 255)?;
        check_nominal(self.nominal)
    }

    pub fn into_new(self) -> NewNotification {
        NewNotification {
            title: self.title.trim().to_string(),
            description: self.description,
            notification_type: self.notification_type.unwrap_or(NotificationType::General),
            nominal: self.nominal,
            event_date: self.event_date,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct BulkCreateNotificationRequest {
    pub notifications: Vec<CreateNotificationRequest>,
}

impl BulkCreateNotificationRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.notifications.is_empty() {
            return Err(ApiError::ValidationError(
                "At least one notification must be provided".to_string(),
            ));
        }
        if self.notifications.len() > MAX_BULK_NOTIFICATIONS {
            return Err(ApiError::ValidationError(format!(
                "Cannot create more than {} notifications at once",
                MAX_BULK_NOTIFICATIONS
            )));
        }
        self.notifications.iter().try_for_each(|n| n.validate())
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateNotificationRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub nominal: Option<Decimal>,
    pub event_date: Option<NaiveDateTime>,
}

impl UpdateNotificationRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(title) = &self.title {
            check_len("Title", title, 3, 255)?;
        }
        check_nominal(self.nominal)
    }

    pub fn into_changeset(self) -> NotificationChangeset {
        NotificationChangeset {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description,
            notification_type: self.notification_type,
            nominal: self.nominal,
            event_date: self.event_date,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct NotificationListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub notification_type: Option<NotificationType>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Serialize, Debug)]
pub struct NotificationStats {
    pub total_notifications: i64,
    pub by_type: BTreeMap<String, i64>,
    pub recent_notifications: i64,
}

#[derive(Deserialize, Debug)]
pub struct LatestQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub struct CleanupQuery {
    pub days: Option<i64>,
}

impl CleanupQuery {
    pub fn days(&self) -> ApiResult<i64> {
        let days = self.days.unwrap_or(30);
        if days < 1 {
            return Err(ApiError::ValidationError(
                "Days must be at least 1".to_string(),
            ));
        }
        Ok(days)
    }
}

// Deliveries
#[derive(Deserialize, Debug)]
pub struct AssignRequest {
    pub notification_id: i32,
    pub user_ids: Vec<i32>,
}

impl AssignRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_id_list("user ID", &self.user_ids, MAX_DELIVERY_USERS)
    }
}

#[derive(Deserialize, Debug)]
pub struct BulkAssignRequest {
    pub notification_ids: Vec<i32>,
    pub user_ids: Vec<i32>,
}

impl BulkAssignRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_id_list("notification ID", &self.notification_ids, MAX_DELIVERY_NOTIFICATIONS)?;
        check_id_list("user ID", &self.user_ids, MAX_DELIVERY_USERS)
    }
}

#[derive(Deserialize, Debug)]
pub struct AssignByRoleRequest {
    pub notification_id: i32,
    pub roles: Vec<UserRole>,
}

impl AssignByRoleRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.roles.is_empty() {
            return Err(ApiError::ValidationError(
                "At least one role must be provided".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct AssignAllRequest {
    pub notification_id: i32,
}

#[derive(Serialize, Debug)]
pub struct BulkAssignmentResponse {
    pub success: bool,
    pub assigned_count: usize,
    pub skipped_count: usize,
    pub message: String,
    pub assignment_ids: Option<Vec<i32>>,
}

#[derive(Deserialize, Debug)]
pub struct MarkReadRequest {
    pub notification_ids: Vec<i32>,
}

impl MarkReadRequest {
    pub fn validate(&self) -> ApiResult<()> {
        check_id_list("notification ID", &self.notification_ids, MAX_DELIVERY_USERS)
    }
}

#[derive(Serialize, Debug)]
pub struct BulkReadResponse {
    pub success: bool,
    pub marked_read_count: usize,
    pub already_read_count: usize,
    pub message: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct InboxQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
    pub notification_type: Option<NotificationType>,
}

#[derive(Serialize, Debug, Clone)]
pub struct NotificationWithReadStatus {
    pub notification: Notification,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub user_notification_id: i32,
}

#[derive(Deserialize, Debug, Default)]
pub struct RecipientsQuery {
    pub is_read: Option<bool>,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct RecipientDetails {
    pub id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_email: Option<String>,
    pub user_role: UserRole,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
}

#[derive(Serialize, Debug)]
pub struct UserNotificationStats {
    pub total_notifications: i64,
    pub unread_count: i64,
    pub read_count: i64,
    pub unread_by_type: BTreeMap<String, i64>,
    pub latest_unread: Option<NotificationWithReadStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> RegisterRequest {
        RegisterRequest {
            student_number: Some("2024001".to_string()),
            password: "correct horse".to_string(),
            name: "Budi".to_string(),
            role: None,
            grade: Some(Grade::Smp1),
            gender: None,
            email: Some("budi@example.com".to_string()),
            region: None,
            date_of_birth: None,
            religion: None,
            birth_place: None,
        }
    }

    #[test]
    fn register_accepts_well_formed_input() {
        assert!(register().validate().is_ok());
    }

    #[test]
    fn register_rejects_short_password_and_student_number() {
        let mut req = register();
        req.password = "short".to_string();
        assert!(matches!(req.validate(), Err(ApiError::ValidationError(_))));

        let mut req = register();
        req.student_number = Some("123".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn register_refuses_admin_role() {
        let mut req = register();
        req.role = Some(UserRole::Admin);
        assert!(req.validate().is_err());
    }

    #[test]
    fn email_shape_check() {
        assert!(validate_email("a@b.co").is_ok());
        for bad in ["", "plain", "@b.co", "a@b", "a@.co", "a b@c.de", "a@b@c.de"] {
            assert!(validate_email(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn class_name_is_trimmed_before_length_check() {
        assert!(CreateClassRequest { name: "  A ".to_string() }.validate().is_err());
        assert!(CreateClassRequest { name: "7A".to_string() }.validate().is_ok());
    }

    #[test]
    fn session_date_cannot_be_in_the_past() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let req = |date, no| CreateSessionRequest { subject_id: 1, session_no: no, date };
        assert!(req(today, 1).validate(today).is_ok());
        assert!(req(today.pred_opt().unwrap(), 1).validate(today).is_err());
        assert!(req(today, 0).validate(today).is_err());
    }

    #[test]
    fn delivery_id_limits() {
        let ok = AssignRequest { notification_id: 1, user_ids: vec![1, 2] };
        assert!(ok.validate().is_ok());

        let empty = AssignRequest { notification_id: 1, user_ids: vec![] };
        assert!(empty.validate().is_err());

        let too_many = AssignRequest {
            notification_id: 1,
            user_ids: (0..=MAX_DELIVERY_USERS as i32).collect(),
        };
        assert!(too_many.validate().is_err());

        let bulk = BulkAssignRequest {
            notification_ids: (0..=MAX_DELIVERY_NOTIFICATIONS as i32).collect(),
            user_ids: vec![1],
        };
        assert!(bulk.validate().is_err());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn page_is_clamped() {
        assert_eq!(Page::new(Some(-5), Some(0)), Page { offset: 0, limit: 1 });
        assert_eq!(Page::new(None, Some(50_000)).limit, MAX_PAGE_SIZE);
        assert_eq!(Page::default().limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn notification_title_and_nominal_rules() {
        let base = CreateNotificationRequest {
            title: "Fee".to_string(),
            description: None,
            notification_type: Some(NotificationType::Payment),
            nominal: Some(Decimal::new(150_000, 2)),
            event_date: None,
        };
        assert!(base.validate().is_ok());

        let mut short = base.clone();
        short.title = " ab ".to_string();
        assert!(short.validate().is_err());

        let mut negative = base.clone();
        negative.nominal = Some(Decimal::new(-1, 0));
        assert!(negative.validate().is_err());

        let created = CreateNotificationRequest { notification_type: None, ..base }.into_new();
        assert_eq!(created.notification_type, NotificationType::General);
    }

    #[test]
    fn admin_update_keeps_profile_fields() {
        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"name":" Sari ","role":"teacher"}"#).unwrap();
        let changes = req.into_changeset();
        assert_eq!(changes.name.as_deref(), Some("Sari"));
        assert_eq!(changes.role, Some(UserRole::Teacher));
        assert!(changes.status.is_none());
    }
}
