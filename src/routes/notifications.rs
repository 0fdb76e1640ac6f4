use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    error::{AppError, AppResult},
    models::Notification,
    notify,
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let user = ctx.require_login(&state)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut conn = state.db()?;
    Ok(Json(notify::list_for_user(&mut conn, user.user_id, limit)?))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(notification_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user = ctx.require_login(&state)?;
    let mut conn = state.db()?;
    if notify::mark_read(&mut conn, user.user_id, notification_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found())
    }
}
