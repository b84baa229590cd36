use crate::db::{self, DbPool};
use crate::dto::{
    dedup_ids, PersonSummary, SubjectWithClass, SubjectWithTeachers, TeacherSubjectDetails,
    TeacherSubjectQuery, TeacherWithSubjects,
};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewTeacherSubject, TeacherSubject, UserRole};
use crate::schema::{classes, subjects, teacher_subjects, users};
use crate::services::require_role;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::info;

pub struct TeacherSubjectService;

type DetailColumns = (
    teacher_subjects::id,
    teacher_subjects::teacher_id,
    users::name,
    teacher_subjects::subject_id,
    subjects::name,
    subjects::class_id,
    classes::name,
);

const DETAILS: DetailColumns = (
    teacher_subjects::id,
    teacher_subjects::teacher_id,
    users::name,
    teacher_subjects::subject_id,
    subjects::name,
    subjects::class_id,
    classes::name,
);

fn not_found() -> ApiError {
    ApiError::NotFoundError("Teacher assignment not found".to_string())
}

fn subject_with_class(conn: &mut PgConnection, subject_id: i32) -> ApiResult<SubjectWithClass> {
    subjects::table
        .inner_join(classes::table)
        .select((subjects::id, subjects::name, subjects::class_id, classes::name))
        .filter(subjects::id.eq(subject_id))
        .first::<SubjectWithClass>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFoundError("Subject not found".to_string()))
}

impl TeacherSubjectService {
    pub async fn assign(teacher_id: i32, subject_id: i32, pool: &DbPool) -> ApiResult<TeacherSubject> {
        let row = db::run(pool, move |conn| {
            require_role(conn, teacher_id, UserRole::Teacher)?;
            subject_with_class(conn, subject_id)?;
            diesel::insert_into(teacher_subjects::table)
                .values(&NewTeacherSubject { teacher_id, subject_id })
                .get_result::<TeacherSubject>(conn)
                .map_err(|e| ApiError::from_diesel(e, "Teacher is already assigned to this subject"))
        })
        .await?;
        info!("Assigned teacher {} to subject {}", teacher_id, subject_id);
        Ok(row)
    }

    /// Assigns several subjects at once; pairs that already exist are skipped.
    pub async fn bulk_assign(
        teacher_id: i32,
        subject_ids: Vec<i32>,
        pool: &DbPool,
    ) -> ApiResult<Vec<TeacherSubject>> {
        let subject_ids = dedup_ids(&subject_ids);
        let rows = db::run(pool, move |conn| {
            require_role(conn, teacher_id, UserRole::Teacher)?;

            let found: Vec<i32> = subjects::table
                .filter(subjects::id.eq_any(&subject_ids))
                .select(subjects::id)
                .load(conn)?;
            let missing: Vec<i32> = subject_ids
                .iter()
                .copied()
                .filter(|id| !found.contains(id))
                .collect();
            if !missing.is_empty() {
                return Err(ApiError::NotFoundError(format!("Subjects not found: {:?}", missing)));
            }

            let pairs: Vec<NewTeacherSubject> = subject_ids
                .iter()
                .map(|&subject_id| NewTeacherSubject { teacher_id, subject_id })
                .collect();
            Ok(diesel::insert_into(teacher_subjects::table)
                .values(&pairs)
                .on_conflict((teacher_subjects::teacher_id, teacher_subjects::subject_id))
                .do_nothing()
                .get_results::<TeacherSubject>(conn)?)
        })
        .await?;
        info!("Bulk assigned {} subjects to teacher {}", rows.len(), teacher_id);
        Ok(rows)
    }

    pub async fn list(query: TeacherSubjectQuery, pool: &DbPool) -> ApiResult<Vec<TeacherSubjectDetails>> {
        let page = crate::dto::Page::new(query.skip, query.limit);
        db::run(pool, move |conn| {
            let mut q = teacher_subjects::table
                .inner_join(users::table)
                .inner_join(subjects::table.inner_join(classes::table))
                .select(DETAILS)
                .into_boxed();
            if let Some(teacher_id) = query.teacher_id {
                q = q.filter(teacher_subjects::teacher_id.eq(teacher_id));
            }
            if let Some(subject_id) = query.subject_id {
                q = q.filter(teacher_subjects::subject_id.eq(subject_id));
            }
            Ok(q
                .order(teacher_subjects::id.asc())
                .offset(page.offset)
                .limit(page.limit)
                .load::<TeacherSubjectDetails>(conn)?)
        })
        .await
    }

    pub async fn get(assignment_id: i32, pool: &DbPool) -> ApiResult<TeacherSubjectDetails> {
        db::run(pool, move |conn| {
            teacher_subjects::table
                .inner_join(users::table)
                .inner_join(subjects::table.inner_join(classes::table))
                .select(DETAILS)
                .filter(teacher_subjects::id.eq(assignment_id))
                .first::<TeacherSubjectDetails>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn teacher_with_subjects(teacher_id: i32, pool: &DbPool) -> ApiResult<TeacherWithSubjects> {
        db::run(pool, move |conn| {
            let teacher = PersonSummary::from(&require_role(conn, teacher_id, UserRole::Teacher)?);
            let subjects = teacher_subjects::table
                .inner_join(subjects::table.inner_join(classes::table))
                .filter(teacher_subjects::teacher_id.eq(teacher_id))
                .select((subjects::id, subjects::name, subjects::class_id, classes::name))
                .order(subjects::name.asc())
                .load::<SubjectWithClass>(conn)?;
            Ok(TeacherWithSubjects { teacher, subjects })
        })
        .await
    }

    pub async fn subject_with_teachers(subject_id: i32, pool: &DbPool) -> ApiResult<SubjectWithTeachers> {
        db::run(pool, move |conn| {
            let subject = subject_with_class(conn, subject_id)?;
            let teachers = teacher_subjects::table
                .inner_join(users::table)
                .filter(teacher_subjects::subject_id.eq(subject_id))
                .select((users::id, users::name, users::email))
                .order(users::name.asc())
                .load::<PersonSummary>(conn)?;
            Ok(SubjectWithTeachers { subject, teachers })
        })
        .await
    }

    pub async fn teachers(pool: &DbPool) -> ApiResult<Vec<PersonSummary>> {
        db::run(pool, move |conn| {
            Ok(users::table
                .filter(users::role.eq(UserRole::Teacher))
                .select((users::id, users::name, users::email))
                .order(users::name.asc())
                .load::<PersonSummary>(conn)?)
        })
        .await
    }

    pub async fn unassign(teacher_id: i32, subject_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(
                teacher_subjects::table
                    .filter(teacher_subjects::teacher_id.eq(teacher_id))
                    .filter(teacher_subjects::subject_id.eq(subject_id)),
            )
            .execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        info!("Unassigned teacher {} from subject {}", teacher_id, subject_id);
        Ok(())
    }

    pub async fn remove(assignment_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(teacher_subjects::table.find(assignment_id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    pub async fn remove_all_for_teacher(teacher_id: i32, pool: &DbPool) -> ApiResult<usize> {
        let deleted = db::run(pool, move |conn| {
            require_role(conn, teacher_id, UserRole::Teacher)?;
            Ok(diesel::delete(
                teacher_subjects::table.filter(teacher_subjects::teacher_id.eq(teacher_id)),
            )
            .execute(conn)?)
        })
        .await?;
        info!("Removed {} assignments of teacher {}", deleted, teacher_id);
        Ok(deleted)
    }
}
