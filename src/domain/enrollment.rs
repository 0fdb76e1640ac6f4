use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use uuid::Uuid;

use super::{DomainError, DomainResult};
use crate::models::{NewEnrollment, Student, Subject};
use crate::schema::{courses, enrollments, students, subjects};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutoEnrollOutcome {
    pub matched: usize,
    pub created: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrolledSubject {
    pub enrollment_id: Uuid,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub semester: String,
    pub course_name: String,
}

/// Enrolls the student in every subject of their own course and semester.
/// Existing enrollments are left alone, so repeated calls are harmless.
pub fn auto_enroll(conn: &mut PgConnection, student_id: Uuid) -> DomainResult<AutoEnrollOutcome> {
    let student = students::table
        .find(student_id)
        .first::<Student>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("student not found"))?;

    let (course_id, semester) = match (student.course_id, student.semester.as_deref()) {
        (Some(course_id), Some(semester)) if !semester.trim().is_empty() => {
            (course_id, semester.to_string())
        }
        _ => {
            return Err(DomainError::invalid_state(
                "student must have a course and semester before auto-enroll",
            ))
        }
    };

    let subject_ids: Vec<Uuid> = subjects::table
        .filter(subjects::course_id.eq(course_id))
        .filter(subjects::semester.eq(&semester))
        .select(subjects::id)
        .load(conn)?;

    if subject_ids.is_empty() {
        return Err(DomainError::not_found(
            "no subjects found for the student's course and semester",
        ));
    }

    let rows: Vec<NewEnrollment> = subject_ids
        .iter()
        .map(|subject_id| NewEnrollment {
            id: Uuid::new_v4(),
            student_id,
            subject_id: *subject_id,
        })
        .collect();

    let created = diesel::insert_into(enrollments::table)
        .values(&rows)
        .on_conflict((enrollments::student_id, enrollments::subject_id))
        .do_nothing()
        .execute(conn)?;

    Ok(AutoEnrollOutcome {
        matched: subject_ids.len(),
        created,
    })
}

pub fn remove_enrollment(
    conn: &mut PgConnection,
    student_id: Uuid,
    enrollment_id: Uuid,
) -> DomainResult<()> {
    let deleted = diesel::delete(
        enrollments::table
            .filter(enrollments::id.eq(enrollment_id))
            .filter(enrollments::student_id.eq(student_id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("enrollment not found"));
    }
    Ok(())
}

pub fn enrollments_for_student(
    conn: &mut PgConnection,
    student_id: Uuid,
) -> QueryResult<Vec<EnrolledSubject>> {
    let rows: Vec<(Uuid, Subject, String)> = enrollments::table
        .inner_join(subjects::table.inner_join(courses::table))
        .filter(enrollments::student_id.eq(student_id))
        .select((enrollments::id, subjects::all_columns, courses::course_name))
        .order((
            courses::course_name.asc(),
            subjects::semester.asc(),
            subjects::subject_name.asc(),
        ))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(enrollment_id, subject, course_name)| EnrolledSubject {
            enrollment_id,
            subject_id: subject.id,
            subject_name: subject.subject_name,
            semester: subject.semester,
            course_name,
        })
        .collect())
}

/// Students currently enrolled in `subject_id`, ordered by roll number.
pub fn enrolled_students(conn: &mut PgConnection, subject_id: Uuid) -> QueryResult<Vec<Student>> {
    enrollments::table
        .inner_join(students::table)
        .filter(enrollments::subject_id.eq(subject_id))
        .select(students::all_columns)
        .order(students::roll_number.asc())
        .load(conn)
}
