use crate::db::{self, DbPool};
use crate::dto::{CreateSubjectRequest, Page, SubjectWithClass, UpdateSubjectRequest};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewSubject, Subject, SubjectChangeset};
use crate::schema::{classes, subjects};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::info;

const DUPLICATE_SUBJECT: &str = "Subject with this name already exists in the class";

pub struct SubjectService;

fn not_found() -> ApiError {
    ApiError::NotFoundError("Subject not found".to_string())
}

fn ensure_class(conn: &mut PgConnection, class_id: i32) -> ApiResult<()> {
    let exists = diesel::select(diesel::dsl::exists(classes::table.find(class_id)))
        .get_result::<bool>(conn)?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFoundError("Class not found".to_string()))
    }
}

type WithClassColumns = (
    subjects::id,
    subjects::name,
    subjects::class_id,
    classes::name,
);

const WITH_CLASS: WithClassColumns = (
    subjects::id,
    subjects::name,
    subjects::class_id,
    classes::name,
);

impl SubjectService {
    pub async fn create(req: CreateSubjectRequest, pool: &DbPool) -> ApiResult<Subject> {
        let new_subject = NewSubject {
            name: req.name.trim().to_string(),
            class_id: req.class_id,
        };
        let subject = db::run(pool, move |conn| {
            ensure_class(conn, new_subject.class_id)?;
            diesel::insert_into(subjects::table)
                .values(&new_subject)
                .get_result::<Subject>(conn)
                .map_err(|e| ApiError::from_diesel(e, DUPLICATE_SUBJECT))
        })
        .await?;
        info!("Created subject {} in class {}", subject.id, subject.class_id);
        Ok(subject)
    }

    pub async fn list(
        class_filter: Option<i32>,
        page: Page,
        pool: &DbPool,
    ) -> ApiResult<Vec<SubjectWithClass>> {
        db::run(pool, move |conn| {
            let mut q = subjects::table
                .inner_join(classes::table)
                .select(WITH_CLASS)
                .into_boxed();
            if let Some(class_id) = class_filter {
                q = q.filter(subjects::class_id.eq(class_id));
            }
            Ok(q
                .order((classes::name.asc(), subjects::name.asc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<SubjectWithClass>(conn)?)
        })
        .await
    }

    pub async fn search(term: String, pool: &DbPool) -> ApiResult<Vec<SubjectWithClass>> {
        db::run(pool, move |conn| {
            Ok(subjects::table
                .inner_join(classes::table)
                .select(WITH_CLASS)
                .filter(subjects::name.ilike(format!("%{}%", term)))
                .order(subjects::name.asc())
                .load::<SubjectWithClass>(conn)?)
        })
        .await
    }

    pub async fn list_by_class(class_id: i32, pool: &DbPool) -> ApiResult<Vec<Subject>> {
        db::run(pool, move |conn| {
            ensure_class(conn, class_id)?;
            Ok(subjects::table
                .filter(subjects::class_id.eq(class_id))
                .order(subjects::name.asc())
                .load::<Subject>(conn)?)
        })
        .await
    }

    pub async fn get(subject_id: i32, pool: &DbPool) -> ApiResult<SubjectWithClass> {
        db::run(pool, move |conn| {
            subjects::table
                .inner_join(classes::table)
                .select(WITH_CLASS)
                .filter(subjects::id.eq(subject_id))
                .first::<SubjectWithClass>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn update(
        subject_id: i32,
        req: UpdateSubjectRequest,
        pool: &DbPool,
    ) -> ApiResult<Subject> {
        let changes = SubjectChangeset {
            name: req.name.map(|n| n.trim().to_string()),
            class_id: req.class_id,
        };
        let subject = db::run(pool, move |conn| {
            if let Some(class_id) = changes.class_id {
                ensure_class(conn, class_id)?;
            }
            if changes.name.is_none() && changes.class_id.is_none() {
                return subjects::table
                    .find(subject_id)
                    .first::<Subject>(conn)
                    .optional()?
                    .ok_or_else(not_found);
            }
            diesel::update(subjects::table.find(subject_id))
                .set(&changes)
                .get_result::<Subject>(conn)
                .optional()
                .map_err(|e| ApiError::from_diesel(e, DUPLICATE_SUBJECT))?
                .ok_or_else(not_found)
        })
        .await?;
        info!("Updated subject {}", subject.id);
        Ok(subject)
    }

    /// Sessions and teacher assignments of the subject cascade.
    pub async fn delete(subject_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(subjects::table.find(subject_id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        info!("Deleted subject {}", subject_id);
        Ok(())
    }

    pub async fn exists(subject_id: i32, pool: &DbPool) -> ApiResult<bool> {
        db::run(pool, move |conn| {
            Ok(diesel::select(diesel::dsl::exists(subjects::table.find(subject_id)))
                .get_result::<bool>(conn)?)
        })
        .await
    }
}
