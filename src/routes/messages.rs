use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    domain::messaging::{self, Contact, MailboxEntry},
    error::AppResult,
    models::Message,
    state::AppState,
};

#[derive(Deserialize, Validate)]
pub struct SendMessageRequest {
    pub receiver_user_id: Uuid,
    #[validate(length(max = 200))]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Serialize)]
pub struct Mailbox {
    pub inbox: Vec<MailboxEntry>,
    pub sent: Vec<MailboxEntry>,
}

pub async fn mailbox(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Mailbox>> {
    let user = ctx.require_login(&state)?;
    let mut conn = state.db()?;
    Ok(Json(Mailbox {
        inbox: messaging::inbox(&mut conn, user.user_id)?,
        sent: messaging::sent(&mut conn, user.user_id)?,
    }))
}

pub async fn contacts(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<Contact>>> {
    let user = ctx.require_login(&state)?;
    let mut conn = state.db()?;
    Ok(Json(messaging::contacts(&mut conn, user.user_id, user.role)?))
}

pub async fn send_message(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let user = ctx.require_login(&state)?;
    payload.validate()?;

    let mut conn = state.db()?;
    let message = messaging::send_message(
        &mut conn,
        user.user_id,
        user.role,
        payload.receiver_user_id,
        payload.subject.as_deref(),
        &payload.body,
    )?;

    info!(message_id = %message.id, sender = %user.user_id, "message sent");
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn read_message(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(message_id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    let user = ctx.require_login(&state)?;
    let mut conn = state.db()?;
    Ok(Json(messaging::read_message(&mut conn, user.user_id, message_id)?))
}
