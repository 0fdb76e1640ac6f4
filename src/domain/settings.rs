use std::collections::BTreeMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::PgConnection;

use super::{DomainError, DomainResult};
use crate::models::SystemSetting;
use crate::schema::system_settings;

pub const COLLEGE_NAME: &str = "college_name";
pub const CURRENCY: &str = "currency";
const DEFAULT_CURRENCY: &str = "USD";

pub fn list_settings(conn: &mut PgConnection) -> QueryResult<Vec<SystemSetting>> {
    system_settings::table
        .order(system_settings::setting_key.asc())
        .load(conn)
}

pub fn get_setting(conn: &mut PgConnection, key: &str) -> QueryResult<Option<String>> {
    system_settings::table
        .find(key)
        .select(system_settings::setting_value)
        .first::<String>(conn)
        .optional()
}

pub fn currency(conn: &mut PgConnection) -> String {
    get_setting(conn, CURRENCY)
        .ok()
        .flatten()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Upserts every pair; the college name may not be blanked.
pub fn update_settings(
    conn: &mut PgConnection,
    values: &BTreeMap<String, String>,
) -> DomainResult<usize> {
    if values.is_empty() {
        return Err(DomainError::invalid_input("no settings supplied"));
    }
    for (key, value) in values {
        if key.trim().is_empty() || key.len() > 100 {
            return Err(DomainError::invalid_input("setting keys must be 1-100 characters"));
        }
        if key == COLLEGE_NAME && value.trim().is_empty() {
            return Err(DomainError::invalid_input("college name is required"));
        }
    }

    conn.transaction::<_, DomainError, _>(|conn| {
        let now = Utc::now().naive_utc();
        for (key, value) in values {
            diesel::insert_into(system_settings::table)
                .values((
                    system_settings::setting_key.eq(key.trim()),
                    system_settings::setting_value.eq(value.trim()),
                ))
                .on_conflict(system_settings::setting_key)
                .do_update()
                .set((
                    system_settings::setting_value.eq(excluded(system_settings::setting_value)),
                    system_settings::updated_at.eq(now),
                ))
                .execute(conn)?;
        }
        Ok(values.len())
    })
}
