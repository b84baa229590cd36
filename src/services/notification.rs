use crate::db::{self, DbPool};
use crate::dto::{
    CreateNotificationRequest, NotificationListQuery, NotificationListResponse, NotificationStats,
    Page, UpdateNotificationRequest,
};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewNotification, Notification, NotificationType};
use crate::schema::notifications;
use chrono::{Duration, NaiveDate, Utc};
use diesel::dsl::{count, date};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::info;
use std::collections::BTreeMap;

pub struct NotificationService;

fn not_found() -> ApiError {
    ApiError::NotFoundError("Notification not found".to_string())
}

struct Filter {
    notification_type: Option<NotificationType>,
    search: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

impl Filter {
    fn query(&self) -> notifications::BoxedQuery<'static, Pg> {
        let mut q = notifications::table.into_boxed();
        if let Some(kind) = self.notification_type {
            q = q.filter(notifications::notification_type.eq(kind));
        }
        if let Some(term) = &self.search {
            let pattern = format!("%{}%", term);
            q = q.filter(
                notifications::title
                    .ilike(pattern.clone())
                    .or(notifications::description.ilike(pattern)),
            );
        }
        if let Some(from) = self.date_from {
            q = q.filter(date(notifications::created_at).ge(from));
        }
        if let Some(to) = self.date_to {
            q = q.filter(date(notifications::created_at).le(to));
        }
        q
    }
}

impl NotificationService {
    pub async fn create(req: CreateNotificationRequest, pool: &DbPool) -> ApiResult<Notification> {
        req.validate()?;
        let new_notification = req.into_new();
        let notification = db::run(pool, move |conn| {
            Ok(diesel::insert_into(notifications::table)
                .values(&new_notification)
                .get_result::<Notification>(conn)?)
        })
        .await?;
        info!(
            "Created {} notification {}",
            notification.notification_type, notification.id
        );
        Ok(notification)
    }

    /// Inserts all notifications in one statement; either every row is created or none.
    pub async fn bulk_create(
        reqs: Vec<CreateNotificationRequest>,
        pool: &DbPool,
    ) -> ApiResult<Vec<Notification>> {
        let rows: Vec<NewNotification> = reqs.into_iter().map(|r| r.into_new()).collect();
        let created = db::run(pool, move |conn| {
            Ok(diesel::insert_into(notifications::table)
                .values(&rows)
                .get_results::<Notification>(conn)?)
        })
        .await?;
        info!("Bulk created {} notifications", created.len());
        Ok(created)
    }

    pub async fn list(query: NotificationListQuery, pool: &DbPool) -> ApiResult<NotificationListResponse> {
        let page = Page::new(query.skip, query.limit);
        let filter = Filter {
            notification_type: query.notification_type,
            search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            date_from: query.date_from,
            date_to: query.date_to,
        };
        db::run(pool, move |conn| {
            let total = filter.query().count().get_result::<i64>(conn)?;
            let notifications = filter
                .query()
                .order((notifications::created_at.desc(), notifications::id.desc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<Notification>(conn)?;
            Ok(NotificationListResponse {
                notifications,
                total,
                skip: page.offset,
                limit: page.limit,
            })
        })
        .await
    }

    pub async fn latest(limit: i64, pool: &DbPool) -> ApiResult<Vec<Notification>> {
        let limit = limit.clamp(1, 50);
        db::run(pool, move |conn| {
            Ok(notifications::table
                .order((notifications::created_at.desc(), notifications::id.desc()))
                .limit(limit)
                .load::<Notification>(conn)?)
        })
        .await
    }

    pub async fn by_type(kind: NotificationType, page: Page, pool: &DbPool) -> ApiResult<Vec<Notification>> {
        db::run(pool, move |conn| {
            Ok(notifications::table
                .filter(notifications::notification_type.eq(kind))
                .order(notifications::created_at.desc())
                .offset(page.offset)
                .limit(page.limit)
                .load::<Notification>(conn)?)
        })
        .await
    }

    pub async fn search(term: String, page: Page, pool: &DbPool) -> ApiResult<Vec<Notification>> {
        let filter = Filter {
            notification_type: None,
            search: Some(term),
            date_from: None,
            date_to: None,
        };
        db::run(pool, move |conn| {
            Ok(filter
                .query()
                .order(notifications::created_at.desc())
                .offset(page.offset)
                .limit(page.limit)
                .load::<Notification>(conn)?)
        })
        .await
    }

    pub async fn stats(pool: &DbPool) -> ApiResult<NotificationStats> {
        let week_ago = (Utc::now() - Duration::days(7)).naive_utc();
        db::run(pool, move |conn| {
            let total_notifications = notifications::table.count().get_result::<i64>(conn)?;
            let counts = notifications::table
                .group_by(notifications::notification_type)
                .select((notifications::notification_type, count(notifications::id)))
                .load::<(NotificationType, i64)>(conn)?;
            let mut by_type: BTreeMap<String, i64> = NotificationType::ALL
                .iter()
                .map(|t| (t.to_string(), 0))
                .collect();
            for (kind, n) in counts {
                by_type.insert(kind.to_string(), n);
            }
            let recent_notifications = notifications::table
                .filter(notifications::created_at.ge(week_ago))
                .count()
                .get_result::<i64>(conn)?;
            Ok(NotificationStats {
                total_notifications,
                by_type,
                recent_notifications,
            })
        })
        .await
    }

    pub async fn get(notification_id: i32, pool: &DbPool) -> ApiResult<Notification> {
        db::run(pool, move |conn| {
            notifications::table
                .find(notification_id)
                .first::<Notification>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await
    }

    pub async fn update(
        notification_id: i32,
        req: UpdateNotificationRequest,
        pool: &DbPool,
    ) -> ApiResult<Notification> {
        req.validate()?;
        let changes = req.into_changeset();
        if changes.is_empty() {
            return Self::get(notification_id, pool).await;
        }
        let notification = db::run(pool, move |conn| {
            diesel::update(notifications::table.find(notification_id))
                .set(&changes)
                .get_result::<Notification>(conn)
                .optional()?
                .ok_or_else(not_found)
        })
        .await?;
        info!("Updated notification {}", notification.id);
        Ok(notification)
    }

    /// Deliveries of the notification cascade.
    pub async fn delete(notification_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(notifications::table.find(notification_id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        info!("Deleted notification {}", notification_id);
        Ok(())
    }

    pub async fn delete_by_type(kind: NotificationType, pool: &DbPool) -> ApiResult<usize> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(
                notifications::table.filter(notifications::notification_type.eq(kind)),
            )
            .execute(conn)?)
        })
        .await?;
        info!("Deleted {} notifications of type {}", deleted, kind);
        Ok(deleted)
    }

    pub async fn delete_older_than(days: i64, pool: &DbPool) -> ApiResult<usize> {
        let cutoff = (Utc::now() - Duration::days(days)).naive_utc();
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(
                notifications::table.filter(notifications::created_at.lt(cutoff)),
            )
            .execute(conn)?)
        })
        .await?;
        info!("Deleted {} notifications older than {} days", deleted, days);
        Ok(deleted)
    }
}
