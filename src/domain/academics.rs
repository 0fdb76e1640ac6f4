//! Courses, subjects and faculty-to-subject assignment.

use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel::{select, PgConnection};
use uuid::Uuid;

use super::{
    is_unique_violation, load_subject, optional_text, required_text, validate_semester,
    DomainError, DomainResult,
};
use crate::models::{Course, Faculty, NewCourse, NewFacultySubject, NewSubject, Subject};
use crate::schema::{courses, faculty, faculty_subject, students, subjects};

pub fn list_courses(conn: &mut PgConnection) -> QueryResult<Vec<Course>> {
    courses::table.order(courses::course_name.asc()).load(conn)
}

pub fn load_course(conn: &mut PgConnection, course_id: Uuid) -> DomainResult<Course> {
    courses::table
        .find(course_id)
        .first::<Course>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("course not found"))
}

pub fn create_course(
    conn: &mut PgConnection,
    course_name: &str,
    duration: Option<&str>,
) -> DomainResult<Course> {
    let row = NewCourse {
        id: Uuid::new_v4(),
        course_name: required_text(course_name, "course name", 100)?,
        duration: optional_text(duration),
    };
    diesel::insert_into(courses::table)
        .values(&row)
        .get_result::<Course>(conn)
        .map_err(|err| {
            if is_unique_violation(&err, None) {
                DomainError::conflict("course name already exists")
            } else {
                err.into()
            }
        })
}

pub fn update_course(
    conn: &mut PgConnection,
    course_id: Uuid,
    course_name: &str,
    duration: Option<&str>,
) -> DomainResult<Course> {
    let course_name = required_text(course_name, "course name", 100)?;
    diesel::update(courses::table.find(course_id))
        .set((
            courses::course_name.eq(course_name),
            courses::duration.eq(optional_text(duration)),
        ))
        .get_result::<Course>(conn)
        .optional()
        .map_err(|err| {
            if is_unique_violation(&err, None) {
                DomainError::conflict("course name already exists")
            } else {
                err.into()
            }
        })?
        .ok_or_else(|| DomainError::not_found("course not found"))
}

/// Refuses to drop a course that still has subjects or students attached.
pub fn delete_course(conn: &mut PgConnection, course_id: Uuid) -> DomainResult<()> {
    conn.transaction::<_, DomainError, _>(|conn| {
        load_course(conn, course_id)?;
        let linked_subjects: i64 = subjects::table
            .filter(subjects::course_id.eq(course_id))
            .select(count_star())
            .first(conn)?;
        let linked_students: i64 = students::table
            .filter(students::course_id.eq(course_id))
            .select(count_star())
            .first(conn)?;
        if linked_subjects > 0 || linked_students > 0 {
            return Err(DomainError::conflict(
                "course is still linked to subjects or students",
            ));
        }
        diesel::delete(courses::table.find(course_id)).execute(conn)?;
        Ok(())
    })
}

pub fn list_subjects(
    conn: &mut PgConnection,
    course_id: Option<Uuid>,
    semester: Option<&str>,
) -> QueryResult<Vec<Subject>> {
    let mut query = subjects::table.into_boxed();
    if let Some(course_id) = course_id {
        query = query.filter(subjects::course_id.eq(course_id));
    }
    if let Some(semester) = semester {
        query = query.filter(subjects::semester.eq(semester.to_string()));
    }
    query
        .order((subjects::semester.asc(), subjects::subject_name.asc()))
        .load(conn)
}

fn subject_conflict(err: diesel::result::Error) -> DomainError {
    if is_unique_violation(&err, None) {
        DomainError::conflict("subject already exists for this course and semester")
    } else {
        err.into()
    }
}

pub fn create_subject(
    conn: &mut PgConnection,
    subject_name: &str,
    course_id: Uuid,
    semester: &str,
) -> DomainResult<Subject> {
    let subject_name = required_text(subject_name, "subject name", 100)?;
    let semester = validate_semester(semester)?;
    load_course(conn, course_id)?;

    let row = NewSubject {
        id: Uuid::new_v4(),
        subject_name,
        course_id,
        semester,
    };
    diesel::insert_into(subjects::table)
        .values(&row)
        .get_result::<Subject>(conn)
        .map_err(subject_conflict)
}

pub fn update_subject(
    conn: &mut PgConnection,
    subject_id: Uuid,
    subject_name: &str,
    course_id: Uuid,
    semester: &str,
) -> DomainResult<Subject> {
    let subject_name = required_text(subject_name, "subject name", 100)?;
    let semester = validate_semester(semester)?;
    load_course(conn, course_id)?;
    load_subject(conn, subject_id)?;

    diesel::update(subjects::table.find(subject_id))
        .set((
            subjects::subject_name.eq(subject_name),
            subjects::course_id.eq(course_id),
            subjects::semester.eq(semester),
        ))
        .get_result::<Subject>(conn)
        .map_err(subject_conflict)
}

pub fn delete_subject(conn: &mut PgConnection, subject_id: Uuid) -> DomainResult<()> {
    let deleted = diesel::delete(subjects::table.find(subject_id)).execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("subject not found"));
    }
    Ok(())
}

pub fn load_faculty(conn: &mut PgConnection, faculty_id: Uuid) -> DomainResult<Faculty> {
    faculty::table
        .find(faculty_id)
        .first::<Faculty>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("faculty member not found"))
}

/// Assigns every listed subject, skipping pairs that already exist.
pub fn assign_subjects(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    subject_ids: &[Uuid],
) -> DomainResult<usize> {
    if subject_ids.is_empty() {
        return Err(DomainError::invalid_input("select at least one subject"));
    }
    load_faculty(conn, faculty_id)?;

    conn.transaction::<_, DomainError, _>(|conn| {
        let mut created = 0;
        for subject_id in subject_ids {
            let subject_exists: bool =
                select(exists(subjects::table.find(*subject_id))).get_result(conn)?;
            if !subject_exists {
                return Err(DomainError::not_found(format!(
                    "subject {subject_id} not found"
                )));
            }
            created += diesel::insert_into(faculty_subject::table)
                .values(&NewFacultySubject {
                    faculty_id,
                    subject_id: *subject_id,
                })
                .on_conflict_do_nothing()
                .execute(conn)?;
        }
        Ok(created)
    })
}

pub fn unassign_subject(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    subject_id: Uuid,
) -> DomainResult<()> {
    let deleted = diesel::delete(
        faculty_subject::table
            .filter(faculty_subject::faculty_id.eq(faculty_id))
            .filter(faculty_subject::subject_id.eq(subject_id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("assignment not found"));
    }
    Ok(())
}

pub fn subjects_for_faculty(conn: &mut PgConnection, faculty_id: Uuid) -> QueryResult<Vec<Subject>> {
    faculty_subject::table
        .inner_join(subjects::table)
        .filter(faculty_subject::faculty_id.eq(faculty_id))
        .select(subjects::all_columns)
        .order((subjects::semester.asc(), subjects::subject_name.asc()))
        .load(conn)
}
