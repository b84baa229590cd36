use crate::db::{self, DbPool};
use crate::dto::Page;
use crate::errors::{ApiError, ApiResult};
use crate::models::{ClassRoom, NewClassRoom};
use crate::schema::classes;
use diesel::prelude::*;
use log::info;

pub struct ClassService;

fn not_found() -> ApiError {
    ApiError::NotFoundError("Class not found".to_string())
}

impl ClassService {
    pub async fn create(name: &str, pool: &DbPool) -> ApiResult<ClassRoom> {
        let new_class = NewClassRoom {
            name: name.trim().to_string(),
        };
        let class = db::run(pool, move |conn| {
            Ok(diesel::insert_into(classes::table)
                .values(&new_class)
                .get_result::<ClassRoom>(conn)?)
        })
        .await?;
        info!("Created class {} ({})", class.id, class.name);
        Ok(class)
    }

    pub async fn list(page: Page, pool: &DbPool) -> ApiResult<Vec<ClassRoom>> {
        db::run(pool, move |conn| {
            Ok(classes::table
                .order((classes::name.asc(), classes::id.asc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<ClassRoom>(conn)?)
        })
        .await
    }

    pub async fn search(term: String, pool: &DbPool) -> ApiResult<Vec<ClassRoom>> {
        db::run(pool, move |conn| {
            Ok(classes::table
                .filter(classes::name.ilike(format!("%{}%", term)))
                .order(classes::name.asc())
                .load::<ClassRoom>(conn)?)
        })
        .await
    }

    pub async fn get(class_id: i32, pool: &DbPool) -> ApiResult<ClassRoom> {
        db::run(pool, move |conn| {
            classes::table
                .find(class_id)
                .first::<ClassRoom>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn update(class_id: i32, name: Option<String>, pool: &DbPool) -> ApiResult<ClassRoom> {
        let class = match name {
            Some(name) => {
                let name = name.trim().to_string();
                db::run(pool, move |conn| {
                    diesel::update(classes::table.find(class_id))
                        .set(classes::name.eq(name))
                        .get_result::<ClassRoom>(conn)
                        .optional()?
                        .ok_or_else(not_found)
                })
                .await?
            }
            None => Self::get(class_id, pool).await?,
        };
        info!("Updated class {}", class.id);
        Ok(class)
    }

    /// Subjects, sessions and enrollments of the class cascade.
    pub async fn delete(class_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(classes::table.find(class_id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        info!("Deleted class {}", class_id);
        Ok(())
    }
}
