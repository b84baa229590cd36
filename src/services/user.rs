use crate::auth::AuthService;
use crate::db::{self, DbPool};
use crate::dto::{RegisterRequest, UserListQuery};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewUser, User, UserChangeset, UserRole, UserStatus};
use crate::schema::users;
use chrono::Utc;
use diesel::prelude::*;
use log::{debug, info};

const DUPLICATE_USER: &str = "Email or student number already registered";

pub struct UserService;

impl UserService {
    pub async fn find_by_id(user_id: i32, pool: &DbPool) -> ApiResult<Option<User>> {
        db::run(pool, move |conn| {
            Ok(users::table.find(user_id).first::<User>(conn).optional()?)
        })
        .await
    }

    pub async fn get(user_id: i32, pool: &DbPool) -> ApiResult<User> {
        Self::find_by_id(user_id, pool).await?.ok_or_else(|| {
            debug!("User not found with ID {}", user_id);
            ApiError::NotFoundError("User not found".to_string())
        })
    }

    /// Looks a user up by e-mail address or student number.
    /// E-mails are stored lower-cased, so that side compares case-insensitively.
    pub async fn find_by_identifier(identifier: &str, pool: &DbPool) -> ApiResult<Option<User>> {
        let student_number = identifier.trim().to_string();
        let email = student_number.to_lowercase();
        db::run(pool, move |conn| {
            Ok(users::table
                .filter(
                    users::email
                        .eq(&email)
                        .or(users::student_number.eq(&student_number)),
                )
                .first::<User>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn register(req: RegisterRequest, pool: &DbPool) -> ApiResult<User> {
        req.validate()?;
        let password_hash = AuthService::hash_password(&req.password)?;

        let new_user = NewUser {
            student_number: req.student_number.map(|s| s.trim().to_string()),
            password_hash,
            name: req.name.trim().to_string(),
            role: req.role.unwrap_or(UserRole::Student),
            grade: req.grade,
            gender: req.gender,
            email: req.email.map(|e| e.trim().to_lowercase()),
            region: req.region,
            date_of_birth: req.date_of_birth,
            religion: req.religion,
            birth_place: req.birth_place,
            status: UserStatus::Active,
        };

        let user = db::run(pool, move |conn| {
            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(conn)
                .map_err(|e| ApiError::from_diesel(e, DUPLICATE_USER))
        })
        .await?;

        info!("Created new user with ID: {} ({})", user.id, user.role);
        Ok(user)
    }

    /// Verifies credentials; inactive accounts are refused even with a valid password.
    pub async fn authenticate(identifier: &str, password: &str, pool: &DbPool) -> ApiResult<User> {
        let invalid = || ApiError::AuthError("Incorrect identifier or password".to_string());

        let user = match Self::find_by_identifier(identifier, pool).await? {
            Some(user) => user,
            None => {
                debug!("Login failed: no user with identifier {}", identifier);
                return Err(invalid());
            }
        };

        if !AuthService::verify_password(password, &user.password_hash)? {
            debug!("Login failed: invalid password for user {}", user.id);
            return Err(invalid());
        }

        if !user.is_active() {
            return Err(ApiError::Forbidden(format!("Account is {}", user.status)));
        }

        Ok(user)
    }

    pub async fn list(query: UserListQuery, pool: &DbPool) -> ApiResult<Vec<User>> {
        let page = crate::dto::Page::new(query.skip, query.limit);
        db::run(pool, move |conn| {
            let mut q = users::table.into_boxed();
            if let Some(role) = query.role {
                q = q.filter(users::role.eq(role));
            }
            if let Some(grade) = query.grade {
                q = q.filter(users::grade.eq(grade));
            }
            if let Some(status) = query.status {
                q = q.filter(users::status.eq(status));
            }
            Ok(q
                .order(users::id.asc())
                .offset(page.offset)
                .limit(page.limit)
                .load::<User>(conn)?)
        })
        .await
    }

    pub async fn update(user_id: i32, mut changes: UserChangeset, pool: &DbPool) -> ApiResult<User> {
        changes.email = changes.email.map(|e| e.trim().to_lowercase());
        changes.updated_at = Some(Utc::now().naive_utc());

        let user = db::run(pool, move |conn| {
            diesel::update(users::table.find(user_id))
                .set(&changes)
                .get_result::<User>(conn)
                .map_err(|e| match e {
                    diesel::result::Error::NotFound => {
                        ApiError::NotFoundError("User not found".to_string())
                    }
                    other => ApiError::from_diesel(other, DUPLICATE_USER),
                })
        })
        .await?;

        info!("Updated user {}", user.id);
        Ok(user)
    }

    pub async fn update_status(user_id: i32, status: UserStatus, pool: &DbPool) -> ApiResult<User> {
        let changes = UserChangeset {
            status: Some(status),
            ..Default::default()
        };
        Self::update(user_id, changes, pool).await
    }

    pub async fn change_password(
        user: &User,
        current_password: &str,
        new_password: &str,
        pool: &DbPool,
    ) -> ApiResult<()> {
        if !AuthService::verify_password(current_password, &user.password_hash)? {
            return Err(ApiError::ValidationError("Incorrect current password".to_string()));
        }
        let changes = UserChangeset {
            password_hash: Some(AuthService::hash_password(new_password)?),
            ..Default::default()
        };
        Self::update(user.id, changes, pool).await?;
        info!("Password changed for user {}", user.id);
        Ok(())
    }

    pub async fn set_profile_picture(
        user_id: i32,
        stored_name: Option<String>,
        pool: &DbPool,
    ) -> ApiResult<User> {
        let now = Utc::now().naive_utc();
        db::run(pool, move |conn| {
            Ok(diesel::update(users::table.find(user_id))
                .set((
                    users::profile_picture.eq(stored_name),
                    users::updated_at.eq(now),
                ))
                .get_result::<User>(conn)?)
        })
        .await
    }

    /// Deletes the user row; memberships, assignments and deliveries cascade.
    pub async fn delete(user_id: i32, pool: &DbPool) -> ApiResult<User> {
        let user = db::run(pool, move |conn| {
            diesel::delete(users::table.find(user_id))
                .get_result::<User>(conn)
                .map_err(|e| match e {
                    diesel::result::Error::NotFound => {
                        ApiError::NotFoundError("User not found".to_string())
                    }
                    other => other.into(),
                })
        })
        .await?;

        info!("Deleted user {}", user.id);
        Ok(user)
    }

    /// Ids among `ids` that have no user row.
    pub async fn missing_ids(ids: Vec<i32>, pool: &DbPool) -> ApiResult<Vec<i32>> {
        db::run(pool, move |conn| {
            let found: Vec<i32> = users::table
                .filter(users::id.eq_any(&ids))
                .select(users::id)
                .load(conn)?;
            Ok(ids.into_iter().filter(|id| !found.contains(id)).collect())
        })
        .await
    }
}
