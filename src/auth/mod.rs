pub mod password;
pub mod session;

use std::fmt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::Cookie;
use axum_extra::TypedHeader;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Session,
    schema::users,
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Faculty, Role::Student];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "faculty" => Some(Role::Faculty),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn landing_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Faculty => "/faculty/dashboard",
            Role::Student => "/student/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip)]
    pub session_id: Uuid,
}

/// Identity snapshot cached in the session row at login.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub session_token: Uuid,
}

impl From<Session> for SessionSnapshot {
    fn from(value: Session) -> Self {
        Self {
            session_id: value.id,
            user_id: value.user_id,
            email: value.email,
            name: value.name,
            role: value.role,
            session_token: value.session_token,
        }
    }
}

/// Result of re-reading `{session_token, is_active}` for the session's user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityLookup {
    Found { session_token: Uuid, is_active: bool },
    Missing,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// `revoke` means the session is stale and must be deleted.
    Unauthenticated { revoke: bool },
    Unauthorized,
    Unavailable,
}

/// Pure gate decision over the cached snapshot and the fresh identity lookup.
pub fn evaluate(
    snapshot: Option<&SessionSnapshot>,
    lookup: IdentityLookup,
    allowed: &[Role],
    fail_open: bool,
) -> Result<Role, GateRejection> {
    let Some(snapshot) = snapshot else {
        return Err(GateRejection::Unauthenticated { revoke: false });
    };

    match lookup {
        IdentityLookup::Found {
            session_token,
            is_active,
        } => {
            if !is_active || session_token != snapshot.session_token {
                return Err(GateRejection::Unauthenticated { revoke: true });
            }
        }
        IdentityLookup::Missing => return Err(GateRejection::Unauthenticated { revoke: true }),
        IdentityLookup::Unavailable if !fail_open => return Err(GateRejection::Unavailable),
        IdentityLookup::Unavailable => {}
    }

    let role = Role::parse(&snapshot.role)
        .ok_or(GateRejection::Unauthenticated { revoke: true })?;
    if !allowed.contains(&role) {
        return Err(GateRejection::Unauthorized);
    }
    Ok(role)
}

/// Per-request view of the session cookie. Roles are checked by each handler
/// through [`RequestContext::require_role`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub raw_session_id: Option<String>,
    pub session: Option<SessionSnapshot>,
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw_session_id = TypedHeader::<Cookie>::from_request_parts(parts, state)
            .await
            .ok()
            .and_then(|TypedHeader(cookies)| {
                cookies
                    .get(session::SESSION_COOKIE_NAME)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            });

        let Some(raw) = raw_session_id else {
            return Ok(Self {
                raw_session_id: None,
                session: None,
            });
        };

        let mut conn = state
            .db()
            .map_err(|_| AppError::unavailable("session store unavailable"))?;
        let session = session::load(&mut conn, &raw).map_err(|err| {
            warn!(error = %err, "failed to load session");
            AppError::unavailable("session store unavailable")
        })?;

        Ok(Self {
            raw_session_id: Some(raw),
            session: session.map(SessionSnapshot::from),
        })
    }
}

impl RequestContext {
    pub fn require_login(&self, state: &AppState) -> AppResult<AuthenticatedUser> {
        self.require_role(state, &Role::ALL)
    }

    pub fn require_role(&self, state: &AppState, allowed: &[Role]) -> AppResult<AuthenticatedUser> {
        let lookup = match self.session.as_ref() {
            Some(snapshot) => lookup_identity(state, snapshot.user_id),
            None => IdentityLookup::Missing,
        };

        match evaluate(
            self.session.as_ref(),
            lookup,
            allowed,
            state.config.auth_fail_open,
        ) {
            Ok(role) => {
                let snapshot = match self.session.as_ref() {
                    Some(snapshot) => snapshot,
                    None => return Err(AppError::redirect_to_login(None)),
                };
                if lookup == IdentityLookup::Unavailable {
                    warn!(
                        user_id = %snapshot.user_id,
                        "identity lookup failed; admitting session without liveness check"
                    );
                } else {
                    record_activity(state, snapshot.session_id);
                }
                Ok(AuthenticatedUser {
                    user_id: snapshot.user_id,
                    email: snapshot.email.clone(),
                    name: snapshot.name.clone(),
                    role,
                    session_id: snapshot.session_id,
                })
            }
            Err(rejection) => Err(self.reject(state, rejection)),
        }
    }

    fn reject(&self, state: &AppState, rejection: GateRejection) -> AppError {
        match rejection {
            GateRejection::Unauthenticated { revoke: true } => {
                if let Some(snapshot) = self.session.as_ref() {
                    revoke_session(state, snapshot.session_id);
                }
                AppError::redirect_to_login(session::clear_session_cookie(&state.config))
            }
            GateRejection::Unauthenticated { revoke: false } => {
                let clear = self
                    .raw_session_id
                    .as_ref()
                    .and_then(|_| session::clear_session_cookie(&state.config));
                AppError::redirect_to_login(clear)
            }
            GateRejection::Unauthorized => AppError::redirect_to_login(None),
            GateRejection::Unavailable => AppError::unavailable("service temporarily unavailable"),
        }
    }
}

fn lookup_identity(state: &AppState, user_id: Uuid) -> IdentityLookup {
    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(err) => {
            warn!(error = %err, "identity lookup could not get a connection");
            return IdentityLookup::Unavailable;
        }
    };

    match users::table
        .find(user_id)
        .select((users::session_token, users::is_active))
        .first::<(Uuid, bool)>(&mut conn)
        .optional()
    {
        Ok(Some((session_token, is_active))) => IdentityLookup::Found {
            session_token,
            is_active,
        },
        Ok(None) => IdentityLookup::Missing,
        Err(err) => {
            warn!(error = %err, %user_id, "identity lookup failed");
            IdentityLookup::Unavailable
        }
    }
}

fn revoke_session(state: &AppState, session_id: Uuid) {
    let result = state
        .pool
        .get()
        .map_err(|err| err.to_string())
        .and_then(|mut conn| {
            session::destroy_by_id(&mut conn, session_id).map_err(|err| err.to_string())
        });
    if let Err(err) = result {
        warn!(error = %err, %session_id, "failed to delete stale session");
    }
}

fn record_activity(state: &AppState, session_id: Uuid) {
    if let Ok(mut conn) = state.pool.get() {
        if let Err(err) = session::touch(&mut conn, session_id) {
            warn!(error = %err, %session_id, "failed to record session activity");
        }
    }
}
