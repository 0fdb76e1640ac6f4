//! Exams, marks entry and published results.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::PgConnection;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::academics::load_course;
use super::enrollment::enrolled_students;
use super::{
    load_subject, required_text, require_assignment, validate_semester, DomainError,
    DomainResult,
};
use crate::models::{Exam, NewExam, NewMark, Student, Subject};
use crate::notify;
use crate::schema::{exams, marks, students, subjects};
use crate::utils::json::classify_mark;

pub const MARKS_UPDATED_MESSAGE: &str =
    "Your exam marks have been updated. Check your dashboard.";

#[derive(Debug, Clone, Serialize)]
pub struct MarkSheetRow {
    pub student_id: Uuid,
    pub name: String,
    pub roll_number: String,
    pub marks: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectMark {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub marks: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamResult {
    pub exam_id: Uuid,
    pub exam_name: String,
    pub exam_date: Option<NaiveDate>,
    pub subjects: Vec<SubjectMark>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MarksSaved {
    pub saved: usize,
    pub notified: usize,
}

pub fn load_exam(conn: &mut PgConnection, exam_id: Uuid) -> DomainResult<Exam> {
    exams::table
        .find(exam_id)
        .first::<Exam>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("exam not found"))
}

/// New exams start as drafts.
pub fn create_exam(
    conn: &mut PgConnection,
    exam_name: &str,
    course_id: Uuid,
    semester: &str,
    exam_date: Option<NaiveDate>,
) -> DomainResult<Exam> {
    let exam_name = required_text(exam_name, "exam name", 100)?;
    let semester = validate_semester(semester)?;
    load_course(conn, course_id)?;

    Ok(diesel::insert_into(exams::table)
        .values(&NewExam {
            id: Uuid::new_v4(),
            exam_name,
            course_id,
            semester,
            exam_date,
            is_published: false,
        })
        .get_result::<Exam>(conn)?)
}

/// Toggles draft/published. Students of the exam's scope are told when a
/// draft becomes visible.
pub fn set_published(conn: &mut PgConnection, exam_id: Uuid, published: bool) -> DomainResult<Exam> {
    let was_published = load_exam(conn, exam_id)?.is_published;
    let exam = diesel::update(exams::table.find(exam_id))
        .set(exams::is_published.eq(published))
        .get_result::<Exam>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("exam not found"))?;

    if exam.is_published && !was_published {
        let recipients = notify::best_effort_recipients(
            students::table
                .filter(students::course_id.eq(exam.course_id))
                .filter(students::semester.eq(&exam.semester))
                .select(students::user_id)
                .load::<Uuid>(conn),
            "exam published",
        );
        let message = format!(
            "Results for {} have been published. Check your dashboard.",
            exam.exam_name
        );
        notify::notify_batch(conn, &recipients, &message);
    }
    Ok(exam)
}

pub fn delete_exam(conn: &mut PgConnection, exam_id: Uuid) -> DomainResult<()> {
    let deleted = diesel::delete(exams::table.find(exam_id)).execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("exam not found"));
    }
    Ok(())
}

pub fn list_exams(
    conn: &mut PgConnection,
    course_id: Option<Uuid>,
    semester: Option<&str>,
) -> QueryResult<Vec<Exam>> {
    let mut query = exams::table.into_boxed();
    if let Some(course_id) = course_id {
        query = query.filter(exams::course_id.eq(course_id));
    }
    if let Some(semester) = semester {
        query = query.filter(exams::semester.eq(semester.to_string()));
    }
    query
        .order((exams::exam_date.desc(), exams::exam_name.asc()))
        .load(conn)
}

/// Exams whose scope matches `subject`, the only ones a faculty member can mark.
pub fn exams_for_subject(conn: &mut PgConnection, subject: &Subject) -> QueryResult<Vec<Exam>> {
    exams::table
        .filter(exams::course_id.eq(subject.course_id))
        .filter(exams::semester.eq(&subject.semester))
        .order(exams::exam_name.asc())
        .load(conn)
}

fn scoped_exam_and_subject(
    conn: &mut PgConnection,
    exam_id: Uuid,
    subject_id: Uuid,
    faculty_id: Uuid,
) -> DomainResult<(Exam, Subject)> {
    require_assignment(conn, faculty_id, subject_id)?;
    let exam = load_exam(conn, exam_id)?;
    let subject = load_subject(conn, subject_id)?;
    if exam.course_id != subject.course_id || exam.semester != subject.semester {
        return Err(DomainError::forbidden(
            "exam and subject belong to different course or semester",
        ));
    }
    Ok((exam, subject))
}

pub fn marks_sheet(
    conn: &mut PgConnection,
    exam_id: Uuid,
    subject_id: Uuid,
    faculty_id: Uuid,
) -> DomainResult<Vec<MarkSheetRow>> {
    scoped_exam_and_subject(conn, exam_id, subject_id, faculty_id)?;

    let recorded: HashMap<Uuid, Option<i32>> = marks::table
        .filter(marks::exam_id.eq(exam_id))
        .filter(marks::subject_id.eq(subject_id))
        .select((marks::student_id, marks::mark_value))
        .load::<(Uuid, Option<i32>)>(conn)?
        .into_iter()
        .collect();

    Ok(enrolled_students(conn, subject_id)?
        .into_iter()
        .map(|student| MarkSheetRow {
            marks: recorded.get(&student.id).copied().flatten(),
            student_id: student.id,
            name: student.name,
            roll_number: student.roll_number,
        })
        .collect())
}

/// Upserts the whole batch in one transaction; the first invalid entry aborts
/// everything and names the student. When the exam is already published,
/// enrolled students of the exam's course are notified after commit.
pub fn enter_marks(
    conn: &mut PgConnection,
    exam_id: Uuid,
    subject_id: Uuid,
    faculty_id: Uuid,
    marks_by_student: &HashMap<Uuid, Value>,
) -> DomainResult<MarksSaved> {
    let (exam, _subject) = scoped_exam_and_subject(conn, exam_id, subject_id, faculty_id)?;

    let saved = conn.transaction::<_, DomainError, _>(|conn| {
        let enrolled: Vec<Uuid> = enrolled_students(conn, subject_id)?
            .into_iter()
            .map(|student| student.id)
            .collect();
        let now = Utc::now().naive_utc();

        let mut entries: Vec<(&Uuid, &Value)> = marks_by_student.iter().collect();
        entries.sort_by_key(|(student_id, _)| **student_id);

        for (student_id, raw) in entries {
            let value = classify_mark(raw).map_err(|reason| {
                DomainError::invalid_input(format!(
                    "invalid marks for student {student_id}: {reason}"
                ))
            })?;
            if !enrolled.contains(student_id) {
                return Err(DomainError::invalid_input(format!(
                    "student {student_id} is not enrolled in this subject"
                )));
            }

            diesel::insert_into(marks::table)
                .values(&NewMark {
                    id: Uuid::new_v4(),
                    exam_id,
                    student_id: *student_id,
                    subject_id,
                    marks: value,
                    entered_by_faculty_id: Some(faculty_id),
                })
                .on_conflict((marks::exam_id, marks::student_id, marks::subject_id))
                .do_update()
                .set((
                    marks::mark_value.eq(excluded(marks::mark_value)),
                    marks::entered_by_faculty_id.eq(excluded(marks::entered_by_faculty_id)),
                    marks::updated_at.eq(now),
                ))
                .execute(conn)?;
        }
        Ok(marks_by_student.len())
    })?;

    info!(%exam_id, %subject_id, saved, "marks saved");

    // Draft marks stay private until the exam is published.
    let notified = if exam.is_published && saved > 0 {
        let recipients = notify::best_effort_recipients(
            notification_recipients(conn, subject_id, exam.course_id),
            "marks saved",
        );
        notify::notify_batch(conn, &recipients, MARKS_UPDATED_MESSAGE)
    } else {
        0
    };

    Ok(MarksSaved { saved, notified })
}

fn notification_recipients(
    conn: &mut PgConnection,
    subject_id: Uuid,
    course_id: Uuid,
) -> QueryResult<Vec<Uuid>> {
    let students = enrolled_students(conn, subject_id)?;
    Ok(students
        .into_iter()
        .filter(|student| student.course_id == Some(course_id))
        .map(|student| student.user_id)
        .collect())
}

/// Published exams in the student's scope with every recorded subject mark.
pub fn published_results(
    conn: &mut PgConnection,
    student: &Student,
) -> QueryResult<Vec<ExamResult>> {
    let (Some(course_id), Some(semester)) = (student.course_id, student.semester.as_deref())
    else {
        return Ok(Vec::new());
    };

    let published: Vec<Exam> = exams::table
        .filter(exams::course_id.eq(course_id))
        .filter(exams::semester.eq(semester))
        .filter(exams::is_published.eq(true))
        .order((exams::exam_date.desc(), exams::exam_name.asc()))
        .load(conn)?;

    published
        .into_iter()
        .map(|exam| {
            Ok(ExamResult {
                subjects: marks_for(conn, exam.id, student.id)?,
                exam_id: exam.id,
                exam_name: exam.exam_name,
                exam_date: exam.exam_date,
            })
        })
        .collect()
}

/// Marks of one exam for one student; empty while the exam is a draft.
pub fn exam_marks(
    conn: &mut PgConnection,
    student: &Student,
    exam_id: Uuid,
) -> DomainResult<Vec<SubjectMark>> {
    let exam = load_exam(conn, exam_id)?;
    if !exam.is_published {
        return Ok(Vec::new());
    }
    if student.course_id != Some(exam.course_id)
        || student.semester.as_deref() != Some(exam.semester.as_str())
    {
        return Err(DomainError::not_found("exam not found"));
    }
    Ok(marks_for(conn, exam_id, student.id)?)
}

fn marks_for(
    conn: &mut PgConnection,
    exam_id: Uuid,
    student_id: Uuid,
) -> QueryResult<Vec<SubjectMark>> {
    let rows: Vec<(Uuid, String, Option<i32>)> = marks::table
        .inner_join(subjects::table)
        .filter(marks::exam_id.eq(exam_id))
        .filter(marks::student_id.eq(student_id))
        .select((subjects::id, subjects::subject_name, marks::mark_value))
        .order(subjects::subject_name.asc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(subject_id, subject_name, marks)| SubjectMark {
            subject_id,
            subject_name,
            marks,
        })
        .collect())
}
