use crate::errors::ApiError;
use actix_web::web;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use diesel::Connection;
use log::info;

// Type aliases
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

// Database initialization SQL
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    student_number VARCHAR(50),
    password_hash VARCHAR(255) NOT NULL,
    name VARCHAR(100) NOT NULL,
    role VARCHAR(20) NOT NULL DEFAULT 'student',
    grade VARCHAR(10),
    gender VARCHAR(10),
    email VARCHAR(100),
    region VARCHAR(100),
    date_of_birth DATE,
    religion VARCHAR(50),
    birth_place VARCHAR(100),
    status VARCHAR(20) NOT NULL DEFAULT 'active',
    profile_picture VARCHAR(255),
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
    CONSTRAINT users_student_number_key UNIQUE (student_number),
    CONSTRAINT users_email_key UNIQUE (email)
);

CREATE TABLE IF NOT EXISTS classes (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS subjects (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    class_id INTEGER NOT NULL,
    CONSTRAINT unique_class_subject UNIQUE (class_id, name)
);

CREATE TABLE IF NOT EXISTS teacher_subjects (
    id SERIAL PRIMARY KEY,
    teacher_id INTEGER NOT NULL,
    subject_id INTEGER NOT NULL,
    CONSTRAINT unique_teacher_subject UNIQUE (teacher_id, subject_id)
);

CREATE TABLE IF NOT EXISTS student_classes (
    id SERIAL PRIMARY KEY,
    student_id INTEGER NOT NULL,
    class_id INTEGER NOT NULL,
    CONSTRAINT student_class_unique UNIQUE (student_id, class_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id SERIAL PRIMARY KEY,
    subject_id INTEGER NOT NULL,
    session_no INTEGER NOT NULL,
    date DATE NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
    CONSTRAINT unique_subject_session_no UNIQUE (subject_id, session_no)
);

CREATE TABLE IF NOT EXISTS session_attachments (
    id SERIAL PRIMARY KEY,
    session_id INTEGER NOT NULL,
    filename VARCHAR(255) NOT NULL,
    stored_name VARCHAR(255) NOT NULL UNIQUE,
    file_size BIGINT NOT NULL,
    content_type VARCHAR(100) NOT NULL,
    uploaded_by INTEGER,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS notifications (
    id SERIAL PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    description TEXT,
    notification_type VARCHAR(20) NOT NULL DEFAULT 'general',
    nominal NUMERIC(10, 2),
    event_date TIMESTAMP,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS user_notifications (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL,
    notification_id INTEGER NOT NULL,
    is_read BOOLEAN NOT NULL DEFAULT FALSE,
    read_at TIMESTAMP,
    CONSTRAINT unique_user_notification UNIQUE (user_id, notification_id)
);

CREATE TABLE IF NOT EXISTS admin_login_logs (
    id SERIAL PRIMARY KEY,
    admin_user_id INTEGER NOT NULL,
    admin_name VARCHAR(100) NOT NULL,
    admin_email VARCHAR(100) NOT NULL,
    login_time TIMESTAMP NOT NULL DEFAULT NOW(),
    logout_time TIMESTAMP,
    session_token VARCHAR(1024) NOT NULL,
    ip_address VARCHAR(45),
    user_agent VARCHAR(500)
);

CREATE INDEX IF NOT EXISTS ix_users_role ON users (role);
CREATE INDEX IF NOT EXISTS ix_user_notifications_user ON user_notifications (user_id, is_read);
CREATE INDEX IF NOT EXISTS ix_sessions_date ON sessions (date);

-- Add foreign keys if not exist
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_subjects_class'
    ) THEN
        ALTER TABLE subjects ADD CONSTRAINT fk_subjects_class
        FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_teacher_subjects_teacher'
    ) THEN
        ALTER TABLE teacher_subjects ADD CONSTRAINT fk_teacher_subjects_teacher
        FOREIGN KEY (teacher_id) REFERENCES users(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_teacher_subjects_subject'
    ) THEN
        ALTER TABLE teacher_subjects ADD CONSTRAINT fk_teacher_subjects_subject
        FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_student_classes_student'
    ) THEN
        ALTER TABLE student_classes ADD CONSTRAINT fk_student_classes_student
        FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_student_classes_class'
    ) THEN
        ALTER TABLE student_classes ADD CONSTRAINT fk_student_classes_class
        FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_sessions_subject'
    ) THEN
        ALTER TABLE sessions ADD CONSTRAINT fk_sessions_subject
        FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_session_attachments_session'
    ) THEN
        ALTER TABLE session_attachments ADD CONSTRAINT fk_session_attachments_session
        FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_session_attachments_uploader'
    ) THEN
        ALTER TABLE session_attachments ADD CONSTRAINT fk_session_attachments_uploader
        FOREIGN KEY (uploaded_by) REFERENCES users(id) ON DELETE SET NULL;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_user_notifications_user'
    ) THEN
        ALTER TABLE user_notifications ADD CONSTRAINT fk_user_notifications_user
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_user_notifications_notification'
    ) THEN
        ALTER TABLE user_notifications ADD CONSTRAINT fk_user_notifications_notification
        FOREIGN KEY (notification_id) REFERENCES notifications(id) ON DELETE CASCADE;
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'fk_admin_login_logs_user'
    ) THEN
        ALTER TABLE admin_login_logs ADD CONSTRAINT fk_admin_login_logs_user
        FOREIGN KEY (admin_user_id) REFERENCES users(id) ON DELETE CASCADE;
    END IF;
END $$;
"#;

/// Runs the idempotent bootstrap script on a dedicated connection.
pub fn init_schema(database_url: &str) -> Result<(), String> {
    let mut conn = PgConnection::establish(database_url)
        .map_err(|e| format!("Failed to establish connection for schema setup: {}", e))?;
    conn.batch_execute(SCHEMA_SQL)
        .map_err(|e| format!("Failed to execute database initialization script: {}", e))?;
    info!("Database initialization complete.");
    Ok(())
}

pub fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, String> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| format!("Failed to create database connection pool: {}", e))
}

/// Checks a connection out of the pool and runs `f` on the blocking thread pool.
pub async fn run<F, T>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let mut conn = pool.get()?;
    web::block(move || f(&mut conn)).await?
}

#[cfg(test)]
mod tests {
    use super::SCHEMA_SQL;

    fn constraint_clause(name: &str) -> String {
        let start = SCHEMA_SQL
            .find(&format!("ADD CONSTRAINT {}", name))
            .unwrap_or_else(|| panic!("missing constraint {}", name));
        let rest = &SCHEMA_SQL[start..];
        let end = rest.find(';').unwrap();
        rest[..end].to_string()
    }

    #[test]
    fn user_owned_rows_cascade_on_user_delete() {
        for name in [
            "fk_student_classes_student",
            "fk_teacher_subjects_teacher",
            "fk_user_notifications_user",
            "fk_admin_login_logs_user",
        ] {
            let clause = constraint_clause(name);
            assert!(clause.contains("REFERENCES users(id)"), "{}", clause);
            assert!(clause.contains("ON DELETE CASCADE"), "{}", clause);
        }
    }

    #[test]
    fn attachments_keep_rows_when_uploader_is_deleted() {
        assert!(constraint_clause("fk_session_attachments_uploader").contains("ON DELETE SET NULL"));
    }

    #[test]
    fn delivery_pairs_are_unique() {
        assert!(SCHEMA_SQL.contains("CONSTRAINT unique_user_notification UNIQUE (user_id, notification_id)"));
    }
}
