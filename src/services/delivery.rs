//! Notification targeting and per-recipient read tracking.
//!
//! Every delivery is a `user_notifications` row guarded by the
//! `(user_id, notification_id)` unique constraint. Inserts use
//! `ON CONFLICT DO NOTHING`, so repeating a delivery, or racing two of them,
//! leaves exactly one row per recipient and reports the rest as skipped.

use crate::db::{self, DbPool};
use crate::dto::{
    dedup_ids, BulkAssignmentResponse, InboxQuery, NotificationWithReadStatus, Page,
    RecipientDetails, UserNotificationStats,
};
use crate::errors::{ApiError, ApiResult};
use crate::models::{NewUserNotification, Notification, NotificationType, UserNotification, UserRole};
use crate::schema::{notifications, user_notifications, users};
use chrono::Utc;
use diesel::dsl::{count, exists};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::{debug, info};
use std::collections::BTreeMap;

// Two bind parameters per row keeps each statement well under the Postgres limit.
const INSERT_CHUNK: usize = 10_000;

/// Who should receive a notification. Resolved against the users table at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    Users(Vec<i32>),
    AllUsers,
    Roles(Vec<UserRole>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Ids of the delivery rows created by this call.
    pub assignment_ids: Vec<i32>,
    /// Recipients that already had the notification.
    pub skipped: usize,
}

impl DeliveryReport {
    fn from_insert(planned: usize, assignment_ids: Vec<i32>) -> Self {
        let skipped = planned.saturating_sub(assignment_ids.len());
        DeliveryReport {
            assignment_ids,
            skipped,
        }
    }

    pub fn assigned(&self) -> usize {
        self.assignment_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(DeliveryReport),
    /// The target resolved to nobody. Not an error.
    NoRecipients,
}

impl From<DeliveryOutcome> for BulkAssignmentResponse {
    fn from(outcome: DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Delivered(report) => BulkAssignmentResponse {
                success: true,
                assigned_count: report.assigned(),
                skipped_count: report.skipped,
                message: format!(
                    "Assigned to {} recipients, {} already had it",
                    report.assigned(),
                    report.skipped
                ),
                assignment_ids: Some(report.assignment_ids),
            },
            DeliveryOutcome::NoRecipients => BulkAssignmentResponse {
                success: false,
                assigned_count: 0,
                skipped_count: 0,
                message: "No users found for the given target".to_string(),
                assignment_ids: None,
            },
        }
    }
}

/// Cross product of notifications and recipients, one row per distinct pair.
pub fn plan(notification_ids: &[i32], recipients: &[i32]) -> Vec<NewUserNotification> {
    let notification_ids = dedup_ids(notification_ids);
    let recipients = dedup_ids(recipients);
    notification_ids
        .iter()
        .flat_map(|&notification_id| {
            recipients.iter().map(move |&user_id| NewUserNotification {
                user_id,
                notification_id,
            })
        })
        .collect()
}

fn missing(requested: &[i32], found: &[i32]) -> Vec<i32> {
    requested
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect()
}

fn ensure_notifications(conn: &mut PgConnection, ids: &[i32]) -> ApiResult<()> {
    let found: Vec<i32> = notifications::table
        .filter(notifications::id.eq_any(ids))
        .select(notifications::id)
        .load(conn)?;
    let missing = missing(ids, &found);
    match missing.as_slice() {
        [] => Ok(()),
        [id] => Err(ApiError::NotFoundError(format!("Notification {} not found", id))),
        _ => Err(ApiError::NotFoundError(format!("Notifications not found: {:?}", missing))),
    }
}

fn resolve_recipients(conn: &mut PgConnection, target: &DeliveryTarget) -> ApiResult<Vec<i32>> {
    match target {
        DeliveryTarget::Users(ids) => {
            let ids = dedup_ids(ids);
            let found: Vec<i32> = users::table
                .filter(users::id.eq_any(&ids))
                .select(users::id)
                .load(conn)?;
            let missing = missing(&ids, &found);
            if !missing.is_empty() {
                return Err(ApiError::NotFoundError(format!("Users not found: {:?}", missing)));
            }
            Ok(ids)
        }
        DeliveryTarget::AllUsers => Ok(users::table
            .select(users::id)
            .order(users::id.asc())
            .load(conn)?),
        DeliveryTarget::Roles(roles) => {
            let roles: Vec<&'static str> = roles.iter().map(|r| r.as_str()).collect();
            Ok(users::table
                .filter(users::role.eq_any(roles))
                .select(users::id)
                .order(users::id.asc())
                .load(conn)?)
        }
    }
}

fn insert_pairs(conn: &mut PgConnection, pairs: &[NewUserNotification]) -> ApiResult<DeliveryReport> {
    let mut created = Vec::with_capacity(pairs.len());
    for chunk in pairs.chunks(INSERT_CHUNK) {
        let ids: Vec<i32> = diesel::insert_into(user_notifications::table)
            .values(chunk)
            .on_conflict((user_notifications::user_id, user_notifications::notification_id))
            .do_nothing()
            .returning(user_notifications::id)
            .get_results(conn)?;
        created.extend(ids);
    }
    Ok(DeliveryReport::from_insert(pairs.len(), created))
}

type InboxRow = (UserNotification, Notification);

fn with_read_status((delivery, notification): InboxRow) -> NotificationWithReadStatus {
    NotificationWithReadStatus {
        notification,
        is_read: delivery.is_read,
        read_at: delivery.read_at,
        user_notification_id: delivery.id,
    }
}

pub struct DeliveryService;

impl DeliveryService {
    pub async fn deliver(
        notification_id: i32,
        target: DeliveryTarget,
        pool: &DbPool,
    ) -> ApiResult<DeliveryOutcome> {
        let outcome = db::run(pool, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                ensure_notifications(conn, &[notification_id])?;
                let recipients = resolve_recipients(conn, &target)?;
                if recipients.is_empty() {
                    debug!("Notification {} target {:?} resolved to nobody", notification_id, target);
                    return Ok(DeliveryOutcome::NoRecipients);
                }
                let pairs = plan(&[notification_id], &recipients);
                Ok(DeliveryOutcome::Delivered(insert_pairs(conn, &pairs)?))
            })
        })
        .await?;

        if let DeliveryOutcome::Delivered(report) = &outcome {
            info!(
                "Notification {} delivered to {} users ({} skipped)",
                notification_id,
                report.assigned(),
                report.skipped
            );
        }
        Ok(outcome)
    }

    /// Delivers every notification to every user; all ids must exist.
    pub async fn bulk_deliver(
        notification_ids: Vec<i32>,
        user_ids: Vec<i32>,
        pool: &DbPool,
    ) -> ApiResult<DeliveryReport> {
        let notification_ids = dedup_ids(&notification_ids);
        let report = db::run(pool, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                ensure_notifications(conn, &notification_ids)?;
                let recipients = resolve_recipients(conn, &DeliveryTarget::Users(user_ids))?;
                insert_pairs(conn, &plan(&notification_ids, &recipients))
            })
        })
        .await?;
        info!(
            "Bulk delivery created {} rows ({} skipped)",
            report.assigned(),
            report.skipped
        );
        Ok(report)
    }

    /// Marks one delivery read. Returns `false` when it was already read;
    /// `read_at` keeps its first value in that case.
    pub async fn mark_read(user_id: i32, notification_id: i32, pool: &DbPool) -> ApiResult<bool> {
        let now = Utc::now().naive_utc();
        db::run(pool, move |conn| {
            let delivery = user_notifications::table
                .filter(user_notifications::user_id.eq(user_id))
                .filter(user_notifications::notification_id.eq(notification_id));
            let updated = diesel::update(delivery.clone().filter(user_notifications::is_read.eq(false)))
                .set((
                    user_notifications::is_read.eq(true),
                    user_notifications::read_at.eq(Some(now)),
                ))
                .execute(conn)?;
            if updated > 0 {
                return Ok(true);
            }
            if diesel::select(exists(delivery)).get_result::<bool>(conn)? {
                Ok(false)
            } else {
                Err(ApiError::NotFoundError(
                    "Notification is not assigned to this user".to_string(),
                ))
            }
        })
        .await
    }

    /// Returns `(newly_marked, already_read)`; ids without a delivery are ignored.
    pub async fn mark_many_read(
        user_id: i32,
        notification_ids: Vec<i32>,
        pool: &DbPool,
    ) -> ApiResult<(usize, usize)> {
        let notification_ids = dedup_ids(&notification_ids);
        let now = Utc::now().naive_utc();
        db::run(pool, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let owned = user_notifications::table
                    .filter(user_notifications::user_id.eq(user_id))
                    .filter(user_notifications::notification_id.eq_any(&notification_ids));
                let total = owned.clone().count().get_result::<i64>(conn)? as usize;
                let marked = diesel::update(owned.filter(user_notifications::is_read.eq(false)))
                    .set((
                        user_notifications::is_read.eq(true),
                        user_notifications::read_at.eq(Some(now)),
                    ))
                    .execute(conn)?;
                Ok((marked, total.saturating_sub(marked)))
            })
        })
        .await
    }

    pub async fn mark_all_read(user_id: i32, pool: &DbPool) -> ApiResult<usize> {
        let now = Utc::now().naive_utc();
        let marked = db::run(pool, move |conn| {
            Ok(diesel::update(
                user_notifications::table
                    .filter(user_notifications::user_id.eq(user_id))
                    .filter(user_notifications::is_read.eq(false)),
            )
            .set((
                user_notifications::is_read.eq(true),
                user_notifications::read_at.eq(Some(now)),
            ))
            .execute(conn)?)
        })
        .await?;
        debug!("Marked {} notifications read for user {}", marked, user_id);
        Ok(marked)
    }

    /// A user's deliveries, newest notification first.
    pub async fn inbox(
        user_id: i32,
        query: InboxQuery,
        pool: &DbPool,
    ) -> ApiResult<Vec<NotificationWithReadStatus>> {
        let page = Page::new(query.skip, query.limit);
        let rows = db::run(pool, move |conn| {
            let mut q = user_notifications::table
                .inner_join(notifications::table)
                .filter(user_notifications::user_id.eq(user_id))
                .select((
                    user_notifications::all_columns,
                    notifications::all_columns,
                ))
                .into_boxed();
            if query.unread_only {
                q = q.filter(user_notifications::is_read.eq(false));
            }
            if let Some(kind) = query.notification_type {
                q = q.filter(notifications::notification_type.eq(kind));
            }
            Ok(q
                .order((notifications::created_at.desc(), notifications::id.desc()))
                .offset(page.offset)
                .limit(page.limit)
                .load::<InboxRow>(conn)?)
        })
        .await?;
        Ok(rows.into_iter().map(with_read_status).collect())
    }

    pub async fn recipients(
        notification_id: i32,
        is_read: Option<bool>,
        pool: &DbPool,
    ) -> ApiResult<Vec<RecipientDetails>> {
        db::run(pool, move |conn| {
            ensure_notifications(conn, &[notification_id])?;
            let mut q = user_notifications::table
                .inner_join(users::table)
                .filter(user_notifications::notification_id.eq(notification_id))
                .select((
                    user_notifications::id,
                    user_notifications::user_id,
                    users::name,
                    users::email,
                    users::role,
                    user_notifications::is_read,
                    user_notifications::read_at,
                ))
                .into_boxed();
            if let Some(read) = is_read {
                q = q.filter(user_notifications::is_read.eq(read));
            }
            Ok(q.order(users::name.asc()).load::<RecipientDetails>(conn)?)
        })
        .await
    }

    pub async fn stats(user_id: i32, pool: &DbPool) -> ApiResult<UserNotificationStats> {
        db::run(pool, move |conn| {
            let mine = user_notifications::table.filter(user_notifications::user_id.eq(user_id));
            let total_notifications = mine.clone().count().get_result::<i64>(conn)?;
            let unread_count = mine
                .filter(user_notifications::is_read.eq(false))
                .count()
                .get_result::<i64>(conn)?;

            let counts = user_notifications::table
                .inner_join(notifications::table)
                .filter(user_notifications::user_id.eq(user_id))
                .filter(user_notifications::is_read.eq(false))
                .group_by(notifications::notification_type)
                .select((notifications::notification_type, count(user_notifications::id)))
                .load::<(NotificationType, i64)>(conn)?;
            let unread_by_type: BTreeMap<String, i64> = counts
                .into_iter()
                .map(|(kind, n)| (kind.to_string(), n))
                .collect();

            let latest_unread = user_notifications::table
                .inner_join(notifications::table)
                .filter(user_notifications::user_id.eq(user_id))
                .filter(user_notifications::is_read.eq(false))
                .select((
                    user_notifications::all_columns,
                    notifications::all_columns,
                ))
                .order((notifications::created_at.desc(), notifications::id.desc()))
                .first::<InboxRow>(conn)
                .optional()?
                .map(with_read_status);

            Ok(UserNotificationStats {
                total_notifications,
                unread_count,
                read_count: total_notifications - unread_count,
                unread_by_type,
                latest_unread,
            })
        })
        .await
    }

    pub async fn remove(user_id: i32, notification_id: i32, pool: &DbPool) -> ApiResult<()> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(
                user_notifications::table
                    .filter(user_notifications::user_id.eq(user_id))
                    .filter(user_notifications::notification_id.eq(notification_id)),
            )
            .execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(ApiError::NotFoundError(
                "Notification is not assigned to this user".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn remove_all_for_user(user_id: i32, pool: &DbPool) -> ApiResult<usize> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(
                user_notifications::table.filter(user_notifications::user_id.eq(user_id)),
            )
            .execute(conn)?)
        })
        .await?;
        info!("Removed {} deliveries of user {}", deleted, user_id);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_is_deduplicated_cross_product() {
        let pairs = plan(&[10, 11, 10], &[1, 2, 2]);
        assert_eq!(pairs.len(), 4);
        assert!(pairs.contains(&NewUserNotification { user_id: 2, notification_id: 11 }));
        let mut keys: Vec<_> = pairs.iter().map(|p| (p.user_id, p.notification_id)).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), pairs.len());
    }

    #[test]
    fn plan_with_no_recipients_is_empty() {
        assert!(plan(&[1], &[]).is_empty());
    }

    #[test]
    fn report_counts_conflicting_rows_as_skipped() {
        let report = DeliveryReport::from_insert(5, vec![41, 42]);
        assert_eq!(report.assigned(), 2);
        assert_eq!(report.skipped, 3);

        let repeat = DeliveryReport::from_insert(5, vec![]);
        assert_eq!(repeat.assigned(), 0);
        assert_eq!(repeat.skipped, 5);
    }

    #[test]
    fn no_recipients_is_reported_without_failure_status() {
        let body = BulkAssignmentResponse::from(DeliveryOutcome::NoRecipients);
        assert!(!body.success);
        assert_eq!(body.assigned_count, 0);
        assert!(body.assignment_ids.is_none());

        let body = BulkAssignmentResponse::from(DeliveryOutcome::Delivered(DeliveryReport {
            assignment_ids: vec![1, 2, 3],
            skipped: 1,
        }));
        assert!(body.success);
        assert_eq!(body.assigned_count, 3);
        assert_eq!(body.skipped_count, 1);
    }

    #[test]
    fn missing_ids_keep_request_order() {
        assert_eq!(missing(&[5, 1, 9], &[1]), vec![5, 9]);
        assert!(missing(&[1, 2], &[2, 1]).is_empty());
    }
}
