use crate::db::{self, DbPool};
use crate::dto::{
    CreateSessionRequest, Page, SessionListQuery, SessionListResponse, SessionStats,
    SessionWithAttachments, SessionWithSubject, SubjectSessionCount, UpdateSessionRequest,
};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewSession, Session, SessionAttachment, SessionChangeset};
use crate::schema::{classes, session_attachments, sessions, subjects};
use crate::storage::{FileStore, ATTACHMENTS_DIR};
use chrono::{Local, NaiveDate, Utc};
use diesel::dsl::{count, exists, max};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use log::{info, warn};

const DUPLICATE_SESSION: &str = "Session number already exists for this subject";

pub struct SessionService;

fn not_found() -> ApiError {
    ApiError::NotFoundError("Session not found".to_string())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn ensure_subject(conn: &mut PgConnection, subject_id: i32) -> ApiResult<()> {
    if diesel::select(exists(subjects::table.find(subject_id))).get_result::<bool>(conn)? {
        Ok(())
    } else {
        Err(ApiError::NotFoundError("Subject not found".to_string()))
    }
}

fn filtered(
    subject_id: Option<i32>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> sessions::BoxedQuery<'static, Pg> {
    let mut q = sessions::table.into_boxed();
    if let Some(subject_id) = subject_id {
        q = q.filter(sessions::subject_id.eq(subject_id));
    }
    if let Some(from) = date_from {
        q = q.filter(sessions::date.ge(from));
    }
    if let Some(to) = date_to {
        q = q.filter(sessions::date.le(to));
    }
    q
}

impl SessionService {
    pub async fn create(req: CreateSessionRequest, pool: &DbPool) -> ApiResult<Session> {
        req.validate(today())?;
        let new_session = NewSession {
            subject_id: req.subject_id,
            session_no: req.session_no,
            date: req.date,
        };
        let session = db::run(pool, move |conn| {
            ensure_subject(conn, new_session.subject_id)?;
            diesel::insert_into(sessions::table)
                .values(&new_session)
                .get_result::<Session>(conn)
                .map_err(|e| ApiError::from_diesel(e, DUPLICATE_SESSION))
        })
        .await?;
        info!(
            "Created session {} (no. {}) for subject {}",
            session.id, session.session_no, session.subject_id
        );
        Ok(session)
    }

    pub async fn list(query: SessionListQuery, pool: &DbPool) -> ApiResult<SessionListResponse> {
        let page = Page::new(query.skip, query.limit);
        db::run(pool, move |conn| {
            let total = filtered(query.subject_id, query.date_from, query.date_to)
                .count()
                .get_result::<i64>(conn)?;
            let sessions = filtered(query.subject_id, query.date_from, query.date_to)
                .order((sessions::date.desc(), sessions::session_no.desc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<Session>(conn)?;
            Ok(SessionListResponse {
                sessions,
                total,
                skip: page.offset,
                limit: page.limit,
            })
        })
        .await
    }

    pub async fn list_by_subject(subject_id: i32, page: Page, pool: &DbPool) -> ApiResult<SessionListResponse> {
        db::run(pool, move |conn| {
            ensure_subject(conn, subject_id)?;
            let total = filtered(Some(subject_id), None, None)
                .count()
                .get_result::<i64>(conn)?;
            let sessions = filtered(Some(subject_id), None, None)
                .order(sessions::session_no.asc())
                .offset(page.offset)
                .limit(page.limit)
                .load::<Session>(conn)?;
            Ok(SessionListResponse {
                sessions,
                total,
                skip: page.offset,
                limit: page.limit,
            })
        })
        .await
    }

    /// Sessions dated today or later, soonest first.
    pub async fn upcoming(limit: i64, pool: &DbPool) -> ApiResult<Vec<SessionWithSubject>> {
        let today = today();
        let limit = limit.clamp(1, 100);
        db::run(pool, move |conn| {
            Ok(sessions::table
                .inner_join(subjects::table.inner_join(classes::table))
                .filter(sessions::date.ge(today))
                .select((
                    sessions::id,
                    sessions::subject_id,
                    sessions::session_no,
                    sessions::date,
                    subjects::name,
                    subjects::class_id,
                    classes::name,
                ))
                .order((sessions::date.asc(), sessions::session_no.asc()))
                .limit(limit)
                .load::<SessionWithSubject>(conn)?)
        })
        .await
    }

    pub async fn stats(pool: &DbPool) -> ApiResult<SessionStats> {
        let today = today();
        db::run(pool, move |conn| {
            let total_sessions = sessions::table.count().get_result::<i64>(conn)?;
            let sessions_by_subject = sessions::table
                .inner_join(subjects::table)
                .group_by((subjects::id, subjects::name))
                .select((subjects::id, subjects::name, count(sessions::id)))
                .order(subjects::name.asc())
                .load::<SubjectSessionCount>(conn)?;
            let upcoming_sessions = sessions::table
                .filter(sessions::date.ge(today))
                .count()
                .get_result::<i64>(conn)?;
            let today_sessions = sessions::table
                .filter(sessions::date.eq(today))
                .count()
                .get_result::<i64>(conn)?;
            Ok(SessionStats {
                total_sessions,
                sessions_by_subject,
                upcoming_sessions,
                today_sessions,
            })
        })
        .await
    }

    pub async fn next_session_number(subject_id: i32, pool: &DbPool) -> ApiResult<i32> {
        db::run(pool, move |conn| {
            ensure_subject(conn, subject_id)?;
            let highest = sessions::table
                .filter(sessions::subject_id.eq(subject_id))
                .select(max(sessions::session_no))
                .first::<Option<i32>>(conn)?;
            Ok(highest.unwrap_or(0) + 1)
        })
        .await
    }

    pub async fn get(session_id: i32, pool: &DbPool) -> ApiResult<Session> {
        db::run(pool, move |conn| {
            sessions::table
                .find(session_id)
                .first::<Session>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn get_with_attachments(session_id: i32, pool: &DbPool) -> ApiResult<SessionWithAttachments> {
        db::run(pool, move |conn| {
            let session = sessions::table
                .find(session_id)
                .first::<Session>(conn)
                .optional()?
                .ok_or_else(not_found)?;
            let attachments = session_attachments::table
                .filter(session_attachments::session_id.eq(session_id))
                .order(session_attachments::created_at.asc())
                .load::<SessionAttachment>(conn)?;
            Ok(SessionWithAttachments { session, attachments })
        })
        .await
    }

    pub async fn update(session_id: i32, req: UpdateSessionRequest, pool: &DbPool) -> ApiResult<Session> {
        req.validate()?;
        let changes = SessionChangeset {
            subject_id: req.subject_id,
            session_no: req.session_no,
            date: req.date,
            updated_at: Some(Utc::now().naive_utc()),
        };
        let session = db::run(pool, move |conn| {
            if let Some(subject_id) = changes.subject_id {
                ensure_subject(conn, subject_id)?;
            }
            diesel::update(sessions::table.find(session_id))
                .set(&changes)
                .get_result::<Session>(conn)
                .optional()
                .map_err(|e| ApiError::from_diesel(e, DUPLICATE_SESSION))?
                .ok_or_else(not_found)
        })
        .await?;
        info!("Updated session {}", session.id);
        Ok(session)
    }

    /// Deletes the session; attachment rows cascade and their files are removed afterwards.
    pub async fn delete(session_id: i32, pool: &DbPool, store: &FileStore) -> ApiResult<()> {
        let stored_names = db::run(pool, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let names = session_attachments::table
                    .filter(session_attachments::session_id.eq(session_id))
                    .select(session_attachments::stored_name)
                    .load::<String>(conn)?;
                let deleted = diesel::delete(sessions::table.find(session_id)).execute(conn)?;
                if deleted == 0 {
                    return Err(not_found());
                }
                Ok(names)
            })
        })
        .await?;

        for name in &stored_names {
            if let Err(e) = store.delete(ATTACHMENTS_DIR, name).await {
                warn!("Failed to remove attachment file {}: {}", name, e);
            }
        }
        info!(
            "Deleted session {} and {} attachment files",
            session_id,
            stored_names.len()
        );
        Ok(())
    }
}
