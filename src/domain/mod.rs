//! Consistency rules for everything scoped by (course, semester, subject).
//!
//! Every function here takes an open connection and re-derives the acting
//! user's scope from the database before writing. Route handlers translate
//! [`DomainError`] into responses; nothing in this module knows about HTTP.

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{select, PgConnection};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use validator::ValidateEmail;
use uuid::Uuid;

use crate::models::{Faculty, Student, Subject};
use crate::schema::{faculty, faculty_subject, students, subjects};

pub mod academics;
pub mod attendance;
pub mod billing;
pub mod enrollment;
pub mod exams;
pub mod materials;
pub mod messaging;
pub mod people;
pub mod settings;
pub mod timetable;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

static SEMESTER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][0-9]+$").expect("semester pattern compiles"));

/// Semesters are a letter followed by digits, e.g. `A1` or `S5`.
pub fn validate_semester(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.len() > 10 || !SEMESTER_PATTERN.is_match(trimmed) {
        return Err(DomainError::invalid_input(
            "semester must be a letter followed by digits, e.g. A1, B2, S5",
        ));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn required_text(value: &str, field: &str, max_len: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_input(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(DomainError::invalid_input(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Same address rule the login form enforces, so every stored account can sign in.
pub(crate) fn required_email(value: &str) -> DomainResult<String> {
    let email = required_text(value, "email", 100)?;
    if !email.validate_email() {
        return Err(DomainError::invalid_input("email must be a valid address"));
    }
    Ok(email)
}

pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// True when `err` is a unique violation, optionally of one named constraint.
pub(crate) fn is_unique_violation(err: &DieselError, constraint: Option<&str>) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => match constraint {
            Some(name) => info.constraint_name() == Some(name),
            None => true,
        },
        _ => false,
    }
}

pub fn faculty_for_user(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<Faculty> {
    faculty::table
        .filter(faculty::user_id.eq(user_id))
        .first::<Faculty>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("faculty profile not found"))
}

pub fn student_for_user(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<Student> {
    students::table
        .filter(students::user_id.eq(user_id))
        .first::<Student>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("student profile not found"))
}

pub fn load_student(conn: &mut PgConnection, student_id: Uuid) -> DomainResult<Student> {
    students::table
        .find(student_id)
        .first::<Student>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("student not found"))
}

pub fn load_subject(conn: &mut PgConnection, subject_id: Uuid) -> DomainResult<Subject> {
    subjects::table
        .find(subject_id)
        .first::<Subject>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("subject not found"))
}

pub fn is_assigned(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    subject_id: Uuid,
) -> QueryResult<bool> {
    select(exists(
        faculty_subject::table
            .filter(faculty_subject::faculty_id.eq(faculty_id))
            .filter(faculty_subject::subject_id.eq(subject_id)),
    ))
    .get_result(conn)
}

/// Rejects faculty members that are not assigned to `subject_id`.
pub fn require_assignment(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    subject_id: Uuid,
) -> DomainResult<()> {
    if is_assigned(conn, faculty_id, subject_id)? {
        Ok(())
    } else {
        Err(DomainError::forbidden("you are not assigned to this subject"))
    }
}
