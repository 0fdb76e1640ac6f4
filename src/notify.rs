//! Best-effort notification and audit sink.
//!
//! Writes here never fail the caller: errors are logged at `warn` and
//! swallowed. Call these after the primary transaction has committed so a
//! failed insert cannot poison it.

use std::fmt::Display;

use diesel::prelude::*;
use diesel::PgConnection;
use tracing::warn;
use uuid::Uuid;

use crate::models::{AuditLog, NewAuditLog, NewNotification, Notification};
use crate::schema::{audit_logs, notifications};

pub fn notify(conn: &mut PgConnection, user_id: Uuid, message: &str) -> bool {
    let row = NewNotification {
        id: Uuid::new_v4(),
        user_id,
        message: message.to_string(),
    };
    match diesel::insert_into(notifications::table)
        .values(&row)
        .execute(conn)
    {
        Ok(_) => true,
        Err(err) => {
            warn!(error = %err, %user_id, "failed to deliver notification");
            false
        }
    }
}

/// Recipient lookups are part of the sink: a failed query notifies nobody.
pub fn best_effort_recipients<T>(lookup: QueryResult<Vec<T>>, context: &str) -> Vec<T> {
    lookup.unwrap_or_else(|err| {
        warn!(error = %err, context, "failed to resolve notification recipients");
        Vec::new()
    })
}

/// Delivers to each recipient independently; returns how many succeeded.
pub fn notify_batch(conn: &mut PgConnection, user_ids: &[Uuid], message: &str) -> usize {
    user_ids
        .iter()
        .filter(|user_id| notify(conn, **user_id, message))
        .count()
}

pub fn audit_log(
    conn: &mut PgConnection,
    actor: Option<Uuid>,
    action: &str,
    table_name: &str,
    record_id: impl Display,
    details: Option<String>,
) {
    let row = NewAuditLog {
        id: Uuid::new_v4(),
        user_id: actor,
        action: action.to_string(),
        table_name: table_name.to_string(),
        record_id: record_id.to_string(),
        details,
    };
    if let Err(err) = diesel::insert_into(audit_logs::table)
        .values(&row)
        .execute(conn)
    {
        warn!(error = %err, action, table_name, "failed to write audit log");
    }
}

pub fn list_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    limit: i64,
) -> QueryResult<Vec<Notification>> {
    notifications::table
        .filter(notifications::user_id.eq(user_id))
        .order(notifications::created_at.desc())
        .limit(limit)
        .load(conn)
}

/// Marks one notification read; only the owner can flip it.
pub fn mark_read(conn: &mut PgConnection, user_id: Uuid, notification_id: Uuid) -> QueryResult<bool> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user_id)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)?;
    Ok(updated > 0)
}

pub fn recent_audit_logs(
    conn: &mut PgConnection,
    table_name: Option<&str>,
    limit: i64,
) -> QueryResult<Vec<AuditLog>> {
    let mut query = audit_logs::table.into_boxed();
    if let Some(table_name) = table_name {
        query = query.filter(audit_logs::table_name.eq(table_name.to_string()));
    }
    query
        .order(audit_logs::created_at.desc())
        .limit(limit)
        .load(conn)
}
