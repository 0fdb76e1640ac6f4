use axum::http::HeaderValue;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    models::{NewSession, Session, User},
    schema::sessions,
};

pub const SESSION_COOKIE_NAME: &str = "college_session";

pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Only this digest is persisted; the raw identifier lives in the cookie.
pub fn hash_session_id(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct IssuedSession {
    pub raw_id: String,
    pub session: Session,
}

/// Persists a fresh session carrying the user's identity snapshot.
pub fn issue(
    conn: &mut PgConnection,
    user: &User,
    display_name: &str,
    ttl_hours: i64,
) -> QueryResult<IssuedSession> {
    let raw_id = generate_session_id();
    let expires_at = (Utc::now() + ChronoDuration::hours(ttl_hours)).naive_utc();

    let new_session = NewSession {
        id: Uuid::new_v4(),
        token_hash: hash_session_id(&raw_id),
        user_id: user.id,
        email: user.email.clone(),
        name: display_name.to_string(),
        role: user.role.clone(),
        session_token: user.session_token,
        expires_at,
    };

    let session = diesel::insert_into(sessions::table)
        .values(&new_session)
        .get_result::<Session>(conn)?;

    Ok(IssuedSession { raw_id, session })
}

/// Looks up a live (unexpired) session by the raw cookie value.
pub fn load(conn: &mut PgConnection, raw_id: &str) -> QueryResult<Option<Session>> {
    let now = Utc::now().naive_utc();
    sessions::table
        .filter(sessions::token_hash.eq(hash_session_id(raw_id)))
        .filter(sessions::expires_at.gt(now))
        .first::<Session>(conn)
        .optional()
}

pub fn destroy(conn: &mut PgConnection, raw_id: &str) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::token_hash.eq(hash_session_id(raw_id))))
        .execute(conn)
}

pub fn destroy_by_id(conn: &mut PgConnection, session_id: Uuid) -> QueryResult<usize> {
    diesel::delete(sessions::table.find(session_id)).execute(conn)
}

pub fn touch(conn: &mut PgConnection, session_id: Uuid) -> QueryResult<usize> {
    diesel::update(sessions::table.find(session_id))
        .set(sessions::last_seen_at.eq(Utc::now().naive_utc()))
        .execute(conn)
}

/// Brings one session in line with a rotated user token so it survives the rotation.
pub fn adopt_token(
    conn: &mut PgConnection,
    session_id: Uuid,
    session_token: Uuid,
) -> QueryResult<usize> {
    diesel::update(sessions::table.find(session_id))
        .set(sessions::session_token.eq(session_token))
        .execute(conn)
}

pub fn purge_expired(conn: &mut PgConnection) -> QueryResult<usize> {
    let now = Utc::now().naive_utc();
    diesel::delete(sessions::table.filter(sessions::expires_at.le(now))).execute(conn)
}

pub fn session_cookie(
    config: &AppConfig,
    raw_id: &str,
    expires_at: NaiveDateTime,
) -> Option<HeaderValue> {
    let max_age = ChronoDuration::hours(config.session_ttl_hours).num_seconds();
    let expires = expires_at.and_utc().to_rfc2822();

    let mut parts = vec![format!("{SESSION_COOKIE_NAME}={raw_id}")];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Lax".into());
    parts.push(format!("Max-Age={max_age}"));
    parts.push(format!("Expires={expires}"));
    push_scope(config, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).ok()
}

pub fn clear_session_cookie(config: &AppConfig) -> Option<HeaderValue> {
    let mut parts = vec![format!("{SESSION_COOKIE_NAME}=")];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Lax".into());
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    push_scope(config, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).ok()
}

fn push_scope(config: &AppConfig, parts: &mut Vec<String>) {
    if config.session_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &config.session_cookie_domain {
        parts.push(format!("Domain={domain}"));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(secure: bool, domain: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/college".into(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            session_ttl_hours: 2,
            session_cookie_secure: secure,
            session_cookie_domain: domain.map(str::to_string),
            cors_allowed_origin: None,
            materials_dir: PathBuf::from("uploads/materials"),
            max_upload_bytes: 1024,
            auth_fail_open: false,
        }
    }

    #[test]
    fn session_ids_are_random_hex() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn hashing_is_stable_and_hides_the_raw_id() {
        let raw = "abc123";
        assert_eq!(hash_session_id(raw), hash_session_id(raw));
        assert_ne!(hash_session_id(raw), raw);
        assert_eq!(hash_session_id(raw).len(), 64);
    }

    #[test]
    fn cookie_carries_flags_from_config() {
        let expires = (Utc::now() + ChronoDuration::hours(2)).naive_utc();
        let cookie = session_cookie(&config(true, Some("college.test")), "xyz", expires).unwrap();
        let text = cookie.to_str().unwrap();
        assert!(text.starts_with("college_session=xyz"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("SameSite=Lax"));
        assert!(text.contains("Max-Age=7200"));
        assert!(text.contains("Secure"));
        assert!(text.contains("Domain=college.test"));
    }

    #[test]
    fn clearing_cookie_expires_it() {
        let cookie = clear_session_cookie(&config(false, None)).unwrap();
        let text = cookie.to_str().unwrap();
        assert!(text.starts_with("college_session=;"));
        assert!(text.contains("Max-Age=0"));
        assert!(!text.contains("Secure"));
    }
}
