use log::warn;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::env;
use std::path::PathBuf;

// Config
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub db_pool_size: u32,
    pub jwt_secret: String,
    pub jwt_expiry_minutes: i64,
    pub upload_dir: PathBuf,
    pub max_attachment_mb: u64,
    pub max_profile_picture_mb: u64,
    pub allowed_origins: Vec<String>,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(val) => val,
            Err(e) => {
                warn!("Failed to load JWT_SECRET: {}", e);
                warn!("Generated an ephemeral JWT secret; issued tokens will not survive a restart");
                Self::generate_secure_secret()
            }
        };

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:3001".to_string(),
                ]
            });

        Ok(Self {
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 8080),
            workers: parse_or("WORKERS", 2),
            db_pool_size: parse_or("DB_POOL_SIZE", 10),
            jwt_secret,
            jwt_expiry_minutes: parse_or("JWT_EXPIRY_MINUTES", 30),
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string())),
            max_attachment_mb: parse_or("MAX_ATTACHMENT_MB", 50),
            max_profile_picture_mb: parse_or("MAX_PROFILE_PICTURE_MB", 5),
            allowed_origins,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < 16 {
            warn!("JWT_SECRET is shorter than 16 characters - THIS IS NOT SECURE FOR PRODUCTION!");
        }

        if self.jwt_expiry_minutes <= 0 {
            return Err("JWT_EXPIRY_MINUTES must be positive".to_string());
        }

        if self.workers == 0 {
            return Err("WORKERS must be positive".to_string());
        }

        if self.db_pool_size == 0 {
            return Err("DB_POOL_SIZE must be positive".to_string());
        }

        if self.max_attachment_mb == 0 || self.max_profile_picture_mb == 0 {
            return Err("Upload size limits must be positive".to_string());
        }

        Ok(())
    }

    pub fn max_attachment_bytes(&self) -> usize {
        (self.max_attachment_mb * 1024 * 1024) as usize
    }

    pub fn max_profile_picture_bytes(&self) -> usize {
        (self.max_profile_picture_mb * 1024 * 1024) as usize
    }

    pub fn generate_secure_secret() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    /// Configuration used by unit tests; never reads the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/eduspace_test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: 1,
            db_pool_size: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_minutes: 30,
            upload_dir: PathBuf::from("uploads"),
            max_attachment_mb: 50,
            max_profile_picture_mb: 5,
            allowed_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_non_positive_expiry() {
        let mut config = AppConfig::for_tests();
        config.jwt_expiry_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(AppConfig::for_tests().validate().is_ok());
    }

    #[test]
    fn byte_limits_are_derived_from_megabytes() {
        let config = AppConfig::for_tests();
        assert_eq!(config.max_attachment_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.max_profile_picture_bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn generated_secret_is_alphanumeric() {
        let secret = AppConfig::generate_secure_secret();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
