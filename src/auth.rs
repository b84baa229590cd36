use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{ApiError, ApiResult};
use crate::models::{User, UserRole};
use crate::services::UserService;
use actix_web::dev::Payload;
use actix_web::{http::header, web, FromRequest, HttpRequest};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub user_id: i32,
    pub role: UserRole,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> ApiResult<String> {
        hash(password, DEFAULT_COST).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::InternalError("Failed to hash password".to_string())
        })
    }

    pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
        verify(password, hash).map_err(|e| {
            error!("Failed to verify password: {}", e);
            ApiError::InternalError("Failed to verify password".to_string())
        })
    }

    pub fn generate_token(user: &User, config: &AppConfig) -> ApiResult<String> {
        let now = Utc::now();
        let iat = now.timestamp() as usize;
        let exp = (now + Duration::minutes(config.jwt_expiry_minutes)).timestamp() as usize;

        let sub = user
            .email
            .clone()
            .or_else(|| user.student_number.clone())
            .unwrap_or_else(|| user.id.to_string());

        let claims = Claims {
            sub,
            exp,
            iat,
            user_id: user.id,
            role: user.role,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Failed to generate token: {}", e);
            ApiError::InternalError("Failed to generate token".to_string())
        })
    }

    pub fn decode_token(token: &str, config: &AppConfig) -> ApiResult<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

/// Which callers an endpoint admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    TeacherOrAdmin,
    AdminOnly,
}

impl Access {
    pub fn allows(self, role: UserRole) -> bool {
        match self {
            Access::Authenticated => true,
            Access::TeacherOrAdmin => matches!(role, UserRole::Admin | UserRole::Teacher),
            Access::AdminOnly => role == UserRole::Admin,
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Access::Authenticated => "Not enough permissions",
            Access::TeacherOrAdmin => "Teacher or admin access required",
            Access::AdminOnly => "Admin access required",
        }
    }
}

/// The caller behind a valid bearer token, loaded fresh from the store.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn require(&self, access: Access) -> ApiResult<()> {
        if access.allows(self.user.role) {
            Ok(())
        } else {
            debug!(
                "User {} with role {} denied: {}",
                self.user.id,
                self.user.role,
                access.denial()
            );
            Err(ApiError::Forbidden(access.denial().to_string()))
        }
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let config = req.app_data::<web::Data<AppConfig>>().cloned();
        let pool = req.app_data::<web::Data<DbPool>>().cloned();

        Box::pin(async move {
            let token =
                token.ok_or_else(|| ApiError::AuthError("Not authenticated".to_string()))?;
            let config = config.ok_or_else(|| {
                error!("AppConfig is not registered as app data");
                ApiError::InternalError("Server misconfigured".to_string())
            })?;
            let claims = AuthService::decode_token(&token, &config)?;

            let pool = pool.ok_or_else(|| {
                error!("DbPool is not registered as app data");
                ApiError::InternalError("Server misconfigured".to_string())
            })?;
            let user = UserService::find_by_id(claims.user_id, &pool)
                .await?
                .ok_or_else(|| ApiError::AuthError("Could not validate credentials".to_string()))?;

            if !user.is_active() {
                return Err(ApiError::Forbidden("Inactive user".to_string()));
            }

            Ok(AuthUser { user, token })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;
    use actix_web::test as actix_test;
    use actix_web::ResponseError;

    fn user_with(role: UserRole) -> User {
        let now = Utc::now().naive_utc();
        User {
            id: 7,
            student_number: Some("2024007".to_string()),
            password_hash: String::new(),
            name: "Dewi".to_string(),
            role,
            grade: None,
            gender: None,
            email: Some("dewi@example.com".to_string()),
            region: None,
            date_of_birth: None,
            religion: None,
            birth_place: None,
            status: UserStatus::Active,
            profile_picture: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = AuthService::hash_password("s3cret-pass").unwrap();
        assert_ne!(hashed, "s3cret-pass");
        assert!(AuthService::verify_password("s3cret-pass", &hashed).unwrap());
        assert!(!AuthService::verify_password("wrong-pass", &hashed).unwrap());
    }

    #[test]
    fn token_carries_identity_and_role() {
        let config = AppConfig::for_tests();
        let token = AuthService::generate_token(&user_with(UserRole::Teacher), &config).unwrap();
        let claims = AuthService::decode_token(&token, &config).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, UserRole::Teacher);
        assert_eq!(claims.sub, "dewi@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = AppConfig::for_tests();
        let token = AuthService::generate_token(&user_with(UserRole::Admin), &config).unwrap();
        let mut other = AppConfig::for_tests();
        other.jwt_secret = "another-secret".to_string();
        assert!(matches!(
            AuthService::decode_token(&token, &other),
            Err(ApiError::AuthError(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = AppConfig::for_tests();
        let past = (Utc::now() - Duration::hours(2)).timestamp() as usize;
        let claims = Claims {
            sub: "x".to_string(),
            exp: past,
            iat: past - 60,
            user_id: 1,
            role: UserRole::Student,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(AuthService::decode_token(&token, &config).is_err());
    }

    #[test]
    fn role_gate_matrix() {
        let expectations = [
            (UserRole::Admin, [true, true, true]),
            (UserRole::Teacher, [true, true, false]),
            (UserRole::Student, [true, false, false]),
            (UserRole::Parent, [true, false, false]),
            (UserRole::StudentParent, [true, false, false]),
        ];
        let levels = [Access::Authenticated, Access::TeacherOrAdmin, Access::AdminOnly];

        for (role, allowed) in expectations {
            let caller = AuthUser {
                user: user_with(role),
                token: String::new(),
            };
            for (access, expected) in levels.iter().zip(allowed) {
                match caller.require(*access) {
                    Ok(()) => assert!(expected, "{:?} should be denied {:?}", role, access),
                    Err(e) => {
                        assert!(!expected, "{:?} should be allowed {:?}", role, access);
                        assert_eq!(e.status_code().as_u16(), 403);
                    }
                }
            }
        }
    }

    #[test]
    fn bearer_token_parsing() {
        let req = actix_test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def"));

        let req = actix_test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = actix_test::TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_none());
    }

    #[actix_web::test]
    async fn extractor_rejects_missing_and_invalid_tokens() {
        let config = web::Data::new(AppConfig::for_tests());

        let req = actix_test::TestRequest::default()
            .app_data(config.clone())
            .to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 401);

        let req = actix_test::TestRequest::default()
            .app_data(config)
            .insert_header((header::AUTHORIZATION, "Bearer not-a-jwt"))
            .to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 401);
    }
}
