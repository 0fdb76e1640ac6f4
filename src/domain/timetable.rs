use chrono::NaiveTime;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use uuid::Uuid;

use super::academics::load_faculty;
use super::{load_subject, optional_text, validate_semester, DomainError, DomainResult};
use crate::models::{NewTimetableEntry, TimetableEntry};
use crate::schema::{courses, faculty, subjects, timetable};

pub const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone)]
pub struct TimetableInput {
    pub course_id: Uuid,
    pub semester: String,
    pub subject_id: Uuid,
    pub faculty_id: Option<Uuid>,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimetableSlot {
    pub id: Uuid,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub course_name: String,
    pub semester: String,
    pub faculty_name: Option<String>,
}

pub fn day_index(day: &str) -> Option<usize> {
    DAYS.iter().position(|d| d.eq_ignore_ascii_case(day))
}

pub fn create_entry(conn: &mut PgConnection, input: &TimetableInput) -> DomainResult<TimetableEntry> {
    let semester = validate_semester(&input.semester)?;
    let day = day_index(input.day_of_week.trim())
        .map(|idx| DAYS[idx].to_string())
        .ok_or_else(|| DomainError::invalid_input("day of week must be one of Sun..Sat"))?;
    if input.end_time <= input.start_time {
        return Err(DomainError::invalid_input("end time must be after start time"));
    }

    let subject = load_subject(conn, input.subject_id)?;
    if subject.course_id != input.course_id || subject.semester != semester {
        return Err(DomainError::invalid_input(
            "subject does not belong to this course and semester",
        ));
    }
    if let Some(faculty_id) = input.faculty_id {
        load_faculty(conn, faculty_id)?;
    }

    Ok(diesel::insert_into(timetable::table)
        .values(&NewTimetableEntry {
            id: Uuid::new_v4(),
            course_id: input.course_id,
            semester,
            subject_id: input.subject_id,
            faculty_id: input.faculty_id,
            day_of_week: day,
            start_time: input.start_time,
            end_time: input.end_time,
            room: optional_text(input.room.as_deref()),
        })
        .get_result::<TimetableEntry>(conn)?)
}

pub fn delete_entry(conn: &mut PgConnection, entry_id: Uuid) -> DomainResult<()> {
    let deleted = diesel::delete(timetable::table.find(entry_id)).execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("timetable entry not found"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub enum TimetableScope<'a> {
    All,
    CourseSemester(Uuid, &'a str),
    Faculty(Uuid),
}

/// Slots in week order (Sunday first), then by start time.
pub fn list_slots(conn: &mut PgConnection, scope: TimetableScope<'_>) -> QueryResult<Vec<TimetableSlot>> {
    let mut query = timetable::table
        .inner_join(subjects::table)
        .inner_join(courses::table)
        .left_join(faculty::table)
        .select((
            timetable::all_columns,
            subjects::subject_name,
            courses::course_name,
            faculty::name.nullable(),
        ))
        .into_boxed();

    match scope {
        TimetableScope::All => {}
        TimetableScope::CourseSemester(course_id, semester) => {
            query = query
                .filter(timetable::course_id.eq(course_id))
                .filter(timetable::semester.eq(semester.to_string()));
        }
        TimetableScope::Faculty(faculty_id) => {
            query = query.filter(timetable::faculty_id.eq(faculty_id));
        }
    }

    let rows: Vec<(TimetableEntry, String, String, Option<String>)> = query.load(conn)?;
    let mut slots: Vec<TimetableSlot> = rows
        .into_iter()
        .map(|(entry, subject_name, course_name, faculty_name)| TimetableSlot {
            id: entry.id,
            day_of_week: entry.day_of_week,
            start_time: entry.start_time,
            end_time: entry.end_time,
            room: entry.room,
            subject_id: entry.subject_id,
            subject_name,
            course_name,
            semester: entry.semester,
            faculty_name,
        })
        .collect();

    slots.sort_by_key(|slot| {
        (
            day_index(&slot.day_of_week).unwrap_or(DAYS.len()),
            slot.start_time,
        )
    });
    Ok(slots)
}
