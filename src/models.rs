use chrono::{NaiveDate, NaiveDateTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Varchar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Declares a closed set of values persisted as their lower-level text form.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[diesel(sql_type = Varchar)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("Invalid {} value: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql<Varchar, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Varchar, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let text = <String as FromSql<Varchar, Pg>>::from_sql(bytes)?;
                text.parse().map_err(Into::into)
            }
        }
    };
}

text_enum! {
    UserRole {
        Admin => "admin",
        Teacher => "teacher",
        Student => "student",
        Parent => "parent",
        StudentParent => "student_parent",
    }
}

text_enum! {
    UserStatus {
        Active => "active",
        Inactive => "inactive",
        Suspended => "suspended",
    }
}

text_enum! {
    /// Kindergarten (TK), primary (SD) and junior high (SMP) levels.
    Grade {
        Tka => "TKA",
        Tkb => "TKB",
        Sd1 => "SD1",
        Sd2 => "SD2",
        Sd3 => "SD3",
        Sd4 => "SD4",
        Sd5 => "SD5",
        Sd6 => "SD6",
        Smp1 => "SMP1",
        Smp2 => "SMP2",
        Smp3 => "SMP3",
    }
}

text_enum! {
    Gender {
        Male => "male",
        Female => "female",
    }
}

text_enum! {
    NotificationType {
        General => "general",
        Announcement => "announcement",
        Assignment => "assignment",
        Event => "event",
        Payment => "payment",
    }
}

// Users
#[derive(Queryable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub student_number: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub grade: Option<Grade>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub religion: Option<String>,
    pub birth_place: Option<String>,
    pub status: UserStatus,
    pub profile_picture: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub student_number: Option<String>,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub grade: Option<Grade>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub religion: Option<String>,
    pub birth_place: Option<String>,
    pub status: UserStatus,
}

/// Partial update; `None` fields are left untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChangeset {
    pub student_number: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub grade: Option<Grade>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub religion: Option<String>,
    pub birth_place: Option<String>,
    pub status: Option<UserStatus>,
    pub updated_at: Option<NaiveDateTime>,
}

// Classes & subjects
#[derive(Queryable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::classes)]
pub struct ClassRoom {
    pub id: i32,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::classes)]
pub struct NewClassRoom {
    pub name: String,
}

#[derive(Queryable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::subjects)]
pub struct Subject {
    pub id: i32,
    pub name: String,
    pub class_id: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::subjects)]
pub struct NewSubject {
    pub name: String,
    pub class_id: i32,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::subjects)]
pub struct SubjectChangeset {
    pub name: Option<String>,
    pub class_id: Option<i32>,
}

// Assignment tables
#[derive(Queryable, Serialize, Debug, Clone)]
pub struct TeacherSubject {
    pub id: i32,
    pub teacher_id: i32,
    pub subject_id: i32,
}

#[derive(Insertable, Debug, Clone, Copy)]
#[diesel(table_name = crate::schema::teacher_subjects)]
pub struct NewTeacherSubject {
    pub teacher_id: i32,
    pub subject_id: i32,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct StudentClass {
    pub id: i32,
    pub student_id: i32,
    pub class_id: i32,
}

#[derive(Insertable, Debug, Clone, Copy)]
#[diesel(table_name = crate::schema::student_classes)]
pub struct NewStudentClass {
    pub student_id: i32,
    pub class_id: i32,
}

// Learning sessions
#[derive(Queryable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::sessions)]
pub struct Session {
    pub id: i32,
    pub subject_id: i32,
    pub session_no: i32,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSession {
    pub subject_id: i32,
    pub session_no: i32,
    pub date: NaiveDate,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::sessions)]
pub struct SessionChangeset {
    pub subject_id: Option<i32>,
    pub session_no: Option<i32>,
    pub date: Option<NaiveDate>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct SessionAttachment {
    pub id: i32,
    pub session_id: i32,
    pub filename: String,
    pub stored_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub uploaded_by: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::session_attachments)]
pub struct NewSessionAttachment {
    pub session_id: i32,
    pub filename: String,
    pub stored_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub uploaded_by: Option<i32>,
}

// Notifications
#[derive(Queryable, Serialize, Debug, Clone)]
pub struct Notification {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub notification_type: NotificationType,
    pub nominal: Option<Decimal>,
    pub event_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub title: String,
    pub description: Option<String>,
    pub notification_type: NotificationType,
    pub nominal: Option<Decimal>,
    pub event_date: Option<NaiveDateTime>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NotificationChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub nominal: Option<Decimal>,
    pub event_date: Option<NaiveDateTime>,
}

impl NotificationChangeset {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.notification_type.is_none()
            && self.nominal.is_none()
            && self.event_date.is_none()
    }
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct UserNotification {
    pub id: i32,
    pub user_id: i32,
    pub notification_id: i32,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
}

#[derive(Insertable, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(table_name = crate::schema::user_notifications)]
pub struct NewUserNotification {
    pub user_id: i32,
    pub notification_id: i32,
}

// Admin sessions
#[derive(Queryable, Serialize, Debug, Clone)]
pub struct AdminLoginLog {
    pub id: i32,
    pub admin_user_id: i32,
    pub admin_name: String,
    pub admin_email: String,
    pub login_time: NaiveDateTime,
    pub logout_time: Option<NaiveDateTime>,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::admin_login_logs)]
pub struct NewAdminLoginLog {
    pub admin_user_id: i32,
    pub admin_name: String,
    pub admin_email: String,
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_their_text_form() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), *role);
        }
        assert_eq!("SMP3".parse::<Grade>().unwrap(), Grade::Smp3);
        assert!("smp3".parse::<Grade>().is_err());
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn enums_serialize_as_stored_text() {
        assert_eq!(serde_json::to_string(&UserRole::StudentParent).unwrap(), "\"student_parent\"");
        assert_eq!(serde_json::to_string(&Grade::Tka).unwrap(), "\"TKA\"");
        let parsed: NotificationType = serde_json::from_str("\"payment\"").unwrap();
        assert_eq!(parsed, NotificationType::Payment);
    }

    #[test]
    fn user_json_never_contains_password_hash() {
        let now = chrono::Utc::now().naive_utc();
        let user = User {
            id: 1,
            student_number: None,
            password_hash: "$2b$12$secret".to_string(),
            name: "Ayu".to_string(),
            role: UserRole::Student,
            grade: Some(Grade::Sd4),
            gender: Some(Gender::Female),
            email: Some("ayu@example.com".to_string()),
            region: None,
            date_of_birth: None,
            religion: None,
            birth_place: None,
            status: UserStatus::Active,
            profile_picture: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["grade"], "SD4");
        assert!(user.is_active());
    }
}
