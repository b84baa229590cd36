use crate::db::{self, DbPool};
use crate::dto::{
    dedup_ids, ClassWithStudents, EnrollRequest, Page, StudentClassDetails, StudentClassQuery,
    StudentSummary, StudentWithClasses,
};
use crate::errors::{ApiError, ApiResult};
use crate::models::{ClassRoom, NewStudentClass, StudentClass, UserRole};
use crate::schema::{classes, student_classes, users};
use crate::services::require_role;
use diesel::prelude::*;
use log::info;
use std::collections::HashSet;

pub struct StudentClassService;

type DetailColumns = (
    student_classes::id,
    student_classes::student_id,
    users::name,
    users::student_number,
    student_classes::class_id,
    classes::name,
);

const DETAILS: DetailColumns = (
    student_classes::id,
    student_classes::student_id,
    users::name,
    users::student_number,
    student_classes::class_id,
    classes::name,
);

const STUDENT_SUMMARY: (users::id, users::name, users::student_number, users::grade) =
    (users::id, users::name, users::student_number, users::grade);

fn not_found() -> ApiError {
    ApiError::NotFoundError("Enrollment not found".to_string())
}

fn class_not_found() -> ApiError {
    ApiError::NotFoundError("Class not found".to_string())
}

impl StudentClassService {
    pub async fn enroll(student_id: i32, class_id: i32, pool: &DbPool) -> ApiResult<StudentClass> {
        let row = db::run(pool, move |conn| {
            require_role(conn, student_id, UserRole::Student)?;
            classes::table
                .find(class_id)
                .select(classes::id)
                .first::<i32>(conn)
                .optional()?
                .ok_or_else(class_not_found)?;
            diesel::insert_into(student_classes::table)
                .values(&NewStudentClass { student_id, class_id })
                .get_result::<StudentClass>(conn)
                .map_err(|e| ApiError::from_diesel(e, "Student is already enrolled in this class"))
        })
        .await?;
        info!("Enrolled student {} in class {}", student_id, class_id);
        Ok(row)
    }

    /// Enrolls one student in several classes; fails when every pair already exists.
    pub async fn bulk_enroll(
        student_id: i32,
        class_ids: Vec<i32>,
        pool: &DbPool,
    ) -> ApiResult<Vec<StudentClass>> {
        let class_ids = dedup_ids(&class_ids);
        let rows = db::run(pool, move |conn| {
            require_role(conn, student_id, UserRole::Student)?;

            let found: Vec<i32> = classes::table
                .filter(classes::id.eq_any(&class_ids))
                .select(classes::id)
                .load(conn)?;
            let missing: Vec<i32> = class_ids
                .iter()
                .copied()
                .filter(|id| !found.contains(id))
                .collect();
            if !missing.is_empty() {
                return Err(ApiError::NotFoundError(format!("Classes not found: {:?}", missing)));
            }

            let pairs: Vec<NewStudentClass> = class_ids
                .iter()
                .map(|&class_id| NewStudentClass { student_id, class_id })
                .collect();
            let inserted = diesel::insert_into(student_classes::table)
                .values(&pairs)
                .on_conflict((student_classes::student_id, student_classes::class_id))
                .do_nothing()
                .get_results::<StudentClass>(conn)?;
            if inserted.is_empty() {
                return Err(ApiError::Conflict(
                    "Student is already enrolled in all specified classes".to_string(),
                ));
            }
            Ok(inserted)
        })
        .await?;
        info!("Enrolled student {} in {} classes", student_id, rows.len());
        Ok(rows)
    }

    /// Enrolls many (student, class) pairs, silently skipping pairs whose
    /// student or class is invalid and pairs that already exist.
    pub async fn bulk_enroll_many(pairs: Vec<EnrollRequest>, pool: &DbPool) -> ApiResult<usize> {
        let count = db::run(pool, move |conn| {
            let student_ids: Vec<i32> = pairs.iter().map(|p| p.student_id).collect();
            let class_ids: Vec<i32> = pairs.iter().map(|p| p.class_id).collect();

            let students: HashSet<i32> = users::table
                .filter(users::id.eq_any(&student_ids))
                .filter(users::role.eq(UserRole::Student))
                .select(users::id)
                .load::<i32>(conn)?
                .into_iter()
                .collect();
            let known_classes: HashSet<i32> = classes::table
                .filter(classes::id.eq_any(&class_ids))
                .select(classes::id)
                .load::<i32>(conn)?
                .into_iter()
                .collect();

            let mut seen = HashSet::new();
            let valid: Vec<NewStudentClass> = pairs
                .iter()
                .filter(|p| students.contains(&p.student_id) && known_classes.contains(&p.class_id))
                .filter(|p| seen.insert((p.student_id, p.class_id)))
                .map(|p| NewStudentClass {
                    student_id: p.student_id,
                    class_id: p.class_id,
                })
                .collect();
            if valid.is_empty() {
                return Ok(0);
            }

            Ok(diesel::insert_into(student_classes::table)
                .values(&valid)
                .on_conflict((student_classes::student_id, student_classes::class_id))
                .do_nothing()
                .execute(conn)?)
        })
        .await?;
        info!("Bulk enrollment created {} rows", count);
        Ok(count)
    }

    pub async fn list(query: StudentClassQuery, pool: &DbPool) -> ApiResult<Vec<StudentClassDetails>> {
        let page = Page::new(query.skip, query.limit);
        db::run(pool, move |conn| {
            let mut q = student_classes::table
                .inner_join(users::table)
                .inner_join(classes::table)
                .select(DETAILS)
                .into_boxed();
            if let Some(student_id) = query.student_id {
                q = q.filter(student_classes::student_id.eq(student_id));
            }
            if let Some(class_id) = query.class_id {
                q = q.filter(student_classes::class_id.eq(class_id));
            }
            Ok(q
                .order(student_classes::id.asc())
                .offset(page.offset)
                .limit(page.limit)
                .load::<StudentClassDetails>(conn)?)
        })
        .await
    }

    pub async fn get(enrollment_id: i32, pool: &DbPool) -> ApiResult<StudentClassDetails> {
        db::run(pool, move |conn| {
            student_classes::table
                .inner_join(users::table)
                .inner_join(classes::table)
                .select(DETAILS)
                .filter(student_classes::id.eq(enrollment_id))
                .first::<StudentClassDetails>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn student_with_classes(student_id: i32, pool: &DbPool) -> ApiResult<StudentWithClasses> {
        db::run(pool, move |conn| {
            let student = StudentSummary::from(&require_role(conn, student_id, UserRole::Student)?);
            let classes = student_classes::table
                .inner_join(classes::table)
                .filter(student_classes::student_id.eq(student_id))
                .select((classes::id, classes::name, classes::created_at))
                .order(classes::name.asc())
                .load::<ClassRoom>(conn)?;
            Ok(StudentWithClasses { student, classes })
        })
        .await
    }

    pub async fn class_with_students(class_id: i32, pool: &DbPool) -> ApiResult<ClassWithStudents> {
        db::run(pool, move |conn| {
            let class = classes::table
                .find(class_id)
                .first::<ClassRoom>(conn)
                .optional()?
                .ok_or_else(class_not_found)?;
            let students = student_classes::table
                .inner_join(users::table)
                .filter(student_classes::class_id.eq(class_id))
                .select(STUDENT_SUMMARY)
                .order(users::name.asc())
                .load::<StudentSummary>(conn)?;
            Ok(ClassWithStudents { class, students })
        })
        .await
    }

    pub async fn students(pool: &DbPool) -> ApiResult<Vec<StudentSummary>> {
        db::run(pool, move |conn| {
            Ok(users::table
                .filter(users::role.eq(UserRole::Student))
                .select(STUDENT_SUMMARY)
                .order(users::name.asc())
                .load::<StudentSummary>(conn)?)
        })
        .await
    }

    pub async fn classes(pool: &DbPool) -> ApiResult<Vec<ClassRoom>> {
        db::run(pool, move |conn| {
            Ok(classes::table
                .order(classes::name.asc())
                .load::<ClassRoom>(conn)?)
        })
        .await
    }

    pub async fn unenroll(student_id: i32, class_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(
                student_classes::table
                    .filter(student_classes::student_id.eq(student_id))
                    .filter(student_classes::class_id.eq(class_id)),
            )
            .execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        info!("Unenrolled student {} from class {}", student_id, class_id);
        Ok(())
    }

    pub async fn remove(enrollment_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(student_classes::table.find(enrollment_id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    pub async fn remove_all_for_student(student_id: i32, pool: &DbPool) -> ApiResult<usize> {
        db::run(pool, move |conn| {
            Ok(diesel::delete(
                student_classes::table.filter(student_classes::student_id.eq(student_id)),
            )
            .execute(conn)?)
        })
        .await
    }

    pub async fn remove_all_for_class(class_id: i32, pool: &DbPool) -> ApiResult<usize> {
        db::run(pool, move |conn| {
            Ok(diesel::delete(
                student_classes::table.filter(student_classes::class_id.eq(class_id)),
            )
            .execute(conn)?)
        })
        .await
    }
}
