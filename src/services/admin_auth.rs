use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::{self, DbPool};
use crate::dto::{AdminLogQuery, AdminLoginRequest, AdminLoginResponse, AdminSessionStatus, Page};
use crate::errors::{ApiError, ApiResult};
use crate::models::{AdminLoginLog, NewAdminLoginLog, User, UserRole};
use crate::schema::{admin_login_logs, users};
use chrono::Utc;
use diesel::prelude::*;
use log::{debug, info, warn};

/// Where an admin login came from.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct AdminAuthService;

fn session_not_found() -> ApiError {
    ApiError::NotFoundError("Active admin session not found".to_string())
}

impl AdminAuthService {
    /// Logs an operator into a shared admin account and records the session.
    pub async fn login(
        req: AdminLoginRequest,
        client: ClientInfo,
        config: &AppConfig,
        pool: &DbPool,
    ) -> ApiResult<AdminLoginResponse> {
        req.validate()?;
        let email = req.email.trim().to_lowercase();

        let lookup = email.clone();
        let admin = db::run(pool, move |conn| {
            Ok(users::table
                .filter(users::email.eq(lookup))
                .filter(users::role.eq(UserRole::Admin))
                .first::<User>(conn)
                .optional()?)
        })
        .await?
        .ok_or_else(|| {
            debug!("Admin login failed: no admin with e-mail {}", email);
            ApiError::AuthError("Admin account not found with this email".to_string())
        })?;

        if !AuthService::verify_password(&req.password, &admin.password_hash)? {
            warn!("Admin login failed: invalid password for user {}", admin.id);
            return Err(ApiError::AuthError("Invalid password".to_string()));
        }
        if !admin.is_active() {
            return Err(ApiError::Forbidden(format!("Account is {}", admin.status)));
        }

        let access_token = AuthService::generate_token(&admin, config)?;
        let entry = NewAdminLoginLog {
            admin_user_id: admin.id,
            admin_name: req.name.trim().to_string(),
            admin_email: email,
            session_token: access_token.clone(),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        };
        let log = db::run(pool, move |conn| {
            Ok(diesel::insert_into(admin_login_logs::table)
                .values(&entry)
                .get_result::<AdminLoginLog>(conn)?)
        })
        .await?;

        info!(
            "Admin session {} opened by {} on account {}",
            log.id, log.admin_name, log.admin_user_id
        );
        Ok(AdminLoginResponse {
            access_token,
            token_type: "bearer",
            admin_user_id: admin.id,
            admin_name: log.admin_name,
            login_time: log.login_time,
            session_id: log.id,
        })
    }

    /// Closes one of the caller's own open sessions.
    pub async fn logout(session_id: i32, admin_user_id: i32, pool: &DbPool) -> ApiResult<()> {
        let now = Utc::now().naive_utc();
        let closed = db::run(pool, move |conn| {
            Ok(diesel::update(
                admin_login_logs::table
                    .find(session_id)
                    .filter(admin_login_logs::admin_user_id.eq(admin_user_id))
                    .filter(admin_login_logs::logout_time.is_null()),
            )
            .set(admin_login_logs::logout_time.eq(now))
            .execute(conn)?)
        })
        .await?;
        if closed == 0 {
            return Err(session_not_found());
        }
        info!("Admin session {} logged out", session_id);
        Ok(())
    }

    pub async fn force_logout(session_id: i32, pool: &DbPool) -> ApiResult<()> {
        let now = Utc::now().naive_utc();
        let closed = db::run(pool, move |conn| {
            Ok(diesel::update(
                admin_login_logs::table
                    .find(session_id)
                    .filter(admin_login_logs::logout_time.is_null()),
            )
            .set(admin_login_logs::logout_time.eq(now))
            .execute(conn)?)
        })
        .await?;
        if closed == 0 {
            return Err(session_not_found());
        }
        warn!("Admin session {} was force logged out", session_id);
        Ok(())
    }

    pub async fn logs(query: AdminLogQuery, pool: &DbPool) -> ApiResult<Vec<AdminLoginLog>> {
        let page = Page::new(query.skip, query.limit);
        db::run(pool, move |conn| {
            let mut q = admin_login_logs::table.into_boxed();
            if let Some(admin_user_id) = query.admin_user_id {
                q = q.filter(admin_login_logs::admin_user_id.eq(admin_user_id));
            }
            if let Some(name) = query.admin_name.filter(|n| !n.trim().is_empty()) {
                q = q.filter(admin_login_logs::admin_name.ilike(format!("%{}%", name.trim())));
            }
            if query.active_only.unwrap_or(false) {
                q = q.filter(admin_login_logs::logout_time.is_null());
            }
            Ok(q
                .order((admin_login_logs::login_time.desc(), admin_login_logs::id.desc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<AdminLoginLog>(conn)?)
        })
        .await
    }

    pub async fn active_sessions(pool: &DbPool) -> ApiResult<Vec<AdminLoginLog>> {
        db::run(pool, move |conn| {
            Ok(admin_login_logs::table
                .filter(admin_login_logs::logout_time.is_null())
                .order(admin_login_logs::login_time.desc())
                .load::<AdminLoginLog>(conn)?)
        })
        .await
    }

    /// Whether `token` is the token of an open session of this admin.
    pub async fn verify_session(admin_user_id: i32, token: String, pool: &DbPool) -> ApiResult<AdminSessionStatus> {
        let session = db::run(pool, move |conn| {
            Ok(admin_login_logs::table
                .filter(admin_login_logs::session_token.eq(token))
                .filter(admin_login_logs::admin_user_id.eq(admin_user_id))
                .filter(admin_login_logs::logout_time.is_null())
                .first::<AdminLoginLog>(conn)
                .optional()?)
        })
        .await?;
        Ok(AdminSessionStatus {
            valid: session.is_some(),
            admin_user_id,
            session,
        })
    }
}
