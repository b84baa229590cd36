pub mod admin_auth;
pub mod attachment;
pub mod class;
pub mod delivery;
pub mod notification;
pub mod profile_picture;
pub mod session;
pub mod student_class;
pub mod subject;
pub mod teacher_subject;
pub mod user;

pub use admin_auth::{AdminAuthService, ClientInfo};
pub use attachment::{AttachmentPolicy, AttachmentService, UploadedFile};
pub use class::ClassService;
pub use delivery::{DeliveryOutcome, DeliveryReport, DeliveryService, DeliveryTarget};
pub use notification::NotificationService;
pub use profile_picture::ProfilePictureService;
pub use session::SessionService;
pub use student_class::StudentClassService;
pub use subject::SubjectService;
pub use teacher_subject::TeacherSubjectService;
pub use user::UserService;

use crate::errors::{ApiError, ApiResult};
use crate::models::{User, UserRole};
use crate::schema::users;
use diesel::pg::PgConnection;
use diesel::prelude::*;

/// Loads a user that must hold `role`; anyone else reads as absent.
pub(crate) fn require_role(conn: &mut PgConnection, user_id: i32, role: UserRole) -> ApiResult<User> {
    users::table
        .find(user_id)
        .filter(users::role.eq(role))
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFoundError(format!("No {} with ID {}", role, user_id)))
}
