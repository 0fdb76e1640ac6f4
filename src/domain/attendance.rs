use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::PgConnection;
use serde::Serialize;
use uuid::Uuid;

use super::enrollment::enrolled_students;
use super::{is_unique_violation, load_subject, require_assignment, DomainError, DomainResult};
use crate::models::{AttendanceSession, NewAttendanceDetail, NewAttendanceSession};
use crate::schema::{attendance, attendance_details, courses, subjects};

pub const PRESENT: &str = "present";
pub const ABSENT: &str = "absent";

const SESSION_KEY: &str = "attendance_session_key";

#[derive(Debug, Clone, Serialize)]
pub struct SheetRow {
    pub student_id: Uuid,
    pub name: String,
    pub roll_number: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAttendance {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub course_name: String,
    pub semester: String,
    pub total_classes: i64,
    pub present_classes: i64,
    pub percent: f64,
}

/// Anything other than an explicit `present` counts as absent.
pub fn normalize_status(raw: Option<&str>) -> &'static str {
    match raw {
        Some(value) if value.trim().eq_ignore_ascii_case(PRESENT) => PRESENT,
        _ => ABSENT,
    }
}

/// Share of present classes, rounded to two decimals.
pub fn attendance_percent(present: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((present as f64 / total as f64) * 10_000.0).round() / 100.0
}

pub fn load_session(conn: &mut PgConnection, attendance_id: Uuid) -> DomainResult<AttendanceSession> {
    attendance::table
        .find(attendance_id)
        .first::<AttendanceSession>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("attendance session not found"))
}

/// Opens the session for one subject on one date. Uniqueness is left to the
/// `(subject, course, semester, date)` constraint.
pub fn create_session(
    conn: &mut PgConnection,
    subject_id: Uuid,
    date: NaiveDate,
    faculty_id: Uuid,
) -> DomainResult<AttendanceSession> {
    require_assignment(conn, faculty_id, subject_id)?;
    let subject = load_subject(conn, subject_id)?;
    if subject.semester.trim().is_empty() {
        return Err(DomainError::invalid_state(
            "subject has no course or semester configured",
        ));
    }

    let row = NewAttendanceSession {
        id: Uuid::new_v4(),
        subject_id,
        course_id: subject.course_id,
        semester: subject.semester,
        date,
        created_by_faculty_id: Some(faculty_id),
    };

    diesel::insert_into(attendance::table)
        .values(&row)
        .get_result::<AttendanceSession>(conn)
        .map_err(|err| {
            if is_unique_violation(&err, Some(SESSION_KEY)) {
                DomainError::conflict("attendance session already exists for this date")
            } else {
                err.into()
            }
        })
}

/// Enrolled students with the status recorded for this session, if any.
pub fn attendance_sheet(
    conn: &mut PgConnection,
    attendance_id: Uuid,
    faculty_id: Uuid,
) -> DomainResult<(AttendanceSession, Vec<SheetRow>)> {
    let session = load_session(conn, attendance_id)?;
    require_assignment(conn, faculty_id, session.subject_id)?;

    let recorded: HashMap<Uuid, String> = attendance_details::table
        .filter(attendance_details::attendance_id.eq(attendance_id))
        .select((attendance_details::student_id, attendance_details::status))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    let rows = enrolled_students(conn, session.subject_id)?
        .into_iter()
        .map(|student| SheetRow {
            status: recorded.get(&student.id).cloned(),
            student_id: student.id,
            name: student.name,
            roll_number: student.roll_number,
        })
        .collect();

    Ok((session, rows))
}

/// Writes exactly one detail row per currently-enrolled student, all or nothing.
/// Returns how many rows were written.
pub fn mark_attendance(
    conn: &mut PgConnection,
    attendance_id: Uuid,
    faculty_id: Uuid,
    status_by_student: &HashMap<Uuid, String>,
) -> DomainResult<usize> {
    let session = load_session(conn, attendance_id)?;
    require_assignment(conn, faculty_id, session.subject_id)?;

    conn.transaction::<_, DomainError, _>(|conn| {
        let students = enrolled_students(conn, session.subject_id)?;
        let now = Utc::now().naive_utc();

        for student in &students {
            let status =
                normalize_status(status_by_student.get(&student.id).map(String::as_str));
            diesel::insert_into(attendance_details::table)
                .values(&NewAttendanceDetail {
                    id: Uuid::new_v4(),
                    attendance_id,
                    student_id: student.id,
                    status: status.to_string(),
                })
                .on_conflict((
                    attendance_details::attendance_id,
                    attendance_details::student_id,
                ))
                .do_update()
                .set((
                    attendance_details::status.eq(excluded(attendance_details::status)),
                    attendance_details::updated_at.eq(now),
                ))
                .execute(conn)?;
        }

        Ok(students.len())
    })
}

/// Per-subject totals for one student across every recorded session.
pub fn student_summary(
    conn: &mut PgConnection,
    student_id: Uuid,
) -> QueryResult<Vec<SubjectAttendance>> {
    let rows: Vec<(Uuid, String, String, String, String)> = attendance_details::table
        .inner_join(
            attendance::table
                .inner_join(subjects::table)
                .inner_join(courses::table),
        )
        .filter(attendance_details::student_id.eq(student_id))
        .select((
            subjects::id,
            subjects::subject_name,
            courses::course_name,
            subjects::semester,
            attendance_details::status,
        ))
        .order((
            courses::course_name.asc(),
            subjects::semester.asc(),
            subjects::subject_name.asc(),
        ))
        .load(conn)?;

    let mut summary: Vec<SubjectAttendance> = Vec::new();
    for (subject_id, subject_name, course_name, semester, status) in rows {
        let idx = match summary.iter().position(|s| s.subject_id == subject_id) {
            Some(idx) => idx,
            None => {
                summary.push(SubjectAttendance {
                    subject_id,
                    subject_name,
                    course_name,
                    semester,
                    total_classes: 0,
                    present_classes: 0,
                    percent: 0.0,
                });
                summary.len() - 1
            }
        };
        let entry = &mut summary[idx];
        entry.total_classes += 1;
        if status == PRESENT {
            entry.present_classes += 1;
        }
    }

    for entry in &mut summary {
        entry.percent = attendance_percent(entry.present_classes, entry.total_classes);
    }
    Ok(summary)
}
