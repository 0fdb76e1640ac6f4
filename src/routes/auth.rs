use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::{
    auth::{password, session, AuthenticatedUser, RequestContext, Role},
    domain::people,
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: AuthenticatedUser,
    pub redirect_to: &'static str,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    payload.validate()?;
    let mut conn = state.db()?;

    // A presented session is never carried across a login.
    if let Some(raw) = ctx.raw_session_id.as_deref() {
        if let Err(err) = session::destroy(&mut conn, raw) {
            warn!(error = %err, "failed to drop previous session on login");
        }
    }

    let email = payload.email.trim();
    let user = people::find_user_by_email(&mut conn, email)?
        .filter(|user| user.is_active)
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let Some(role) = Role::parse(&user.role) else {
        warn!(user_id = %user.id, role = %user.role, "rejecting login with unknown role");
        return Err(AppError::unauthorized());
    };

    let name = people::display_name(&mut conn, &user)?;
    let issued = session::issue(&mut conn, &user, &name, state.config.session_ttl_hours)?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) =
        session::session_cookie(&state.config, &issued.raw_id, issued.session.expires_at)
    {
        headers.insert(SET_COOKIE, cookie);
    }

    info!(user_id = %user.id, %role, "user logged in");
    Ok((
        headers,
        Json(LoginResponse {
            user: AuthenticatedUser {
                user_id: user.id,
                email: user.email,
                name,
                role,
                session_id: issued.session.id,
            },
            redirect_to: role.landing_path(),
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<(HeaderMap, StatusCode)> {
    if let Some(raw) = ctx.raw_session_id.as_deref() {
        let mut conn = state.db()?;
        session::destroy(&mut conn, raw)?;
    }

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session::clear_session_cookie(&state.config) {
        headers.insert(SET_COOKIE, cookie);
    }
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<AuthenticatedUser>> {
    Ok(Json(ctx.require_login(&state)?))
}

pub async fn change_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let user = ctx.require_login(&state)?;
    people::validate_password_change(
        &payload.current_password,
        &payload.new_password,
        &payload.confirm_password,
    )?;

    let mut conn = state.db()?;
    let account = people::find_user(&mut conn, user.user_id)?;
    let current_ok = password::verify_password(&payload.current_password, &account.password_hash)
        .map_err(AppError::from)?;
    if !current_ok {
        return Err(AppError::bad_request("current password is incorrect"));
    }

    let hash = password::hash_password(&payload.new_password)?;
    people::apply_password_change(&mut conn, user.user_id, user.session_id, &hash)?;

    info!(user_id = %user.user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
