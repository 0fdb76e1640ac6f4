use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use uuid::Uuid;

use super::enrollment::enrolled_students;
use super::{
    faculty_for_user, load_subject, optional_text, required_text, require_assignment,
    student_for_user, DomainError, DomainResult,
};
use crate::auth::Role;
use crate::models::{NewStudyMaterial, StudyMaterial};
use crate::notify;
use crate::schema::{study_materials, subjects};

pub const PDF_EXTENSION: &str = "pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, Serialize)]
pub struct MaterialListing {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub semester: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

/// Accepts only non-empty PDFs within `max_bytes`, judged by both the file
/// extension and the leading magic bytes.
pub fn validate_pdf_upload(file_name: &str, bytes: &[u8], max_bytes: usize) -> DomainResult<()> {
    if bytes.is_empty() || bytes.len() > max_bytes {
        return Err(DomainError::invalid_input(format!(
            "file size must be between 1 byte and {} MB",
            max_bytes / (1024 * 1024)
        )));
    }

    let is_pdf_name = mime_guess::from_path(file_name)
        .first()
        .is_some_and(|mime| mime.essence_str() == "application/pdf");
    if !is_pdf_name || !bytes.starts_with(PDF_MAGIC) {
        return Err(DomainError::invalid_input("only PDF files are allowed"));
    }
    Ok(())
}

pub struct MaterialUpload<'a> {
    pub subject_id: Uuid,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub stored_name: String,
}

/// Records an already stored file. Enrolled students hear about it once the
/// row exists.
pub fn record_material(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    upload: MaterialUpload<'_>,
) -> DomainResult<StudyMaterial> {
    let title = required_text(upload.title, "title", 200)?;
    require_assignment(conn, faculty_id, upload.subject_id)?;
    let subject = load_subject(conn, upload.subject_id)?;

    let material = diesel::insert_into(study_materials::table)
        .values(&NewStudyMaterial {
            id: Uuid::new_v4(),
            subject_id: subject.id,
            course_id: subject.course_id,
            semester: subject.semester.clone(),
            uploaded_by_faculty_id: faculty_id,
            title,
            description: optional_text(upload.description),
            file_path: upload.stored_name,
            file_type: PDF_EXTENSION.to_string(),
        })
        .get_result::<StudyMaterial>(conn)?;

    let recipients: Vec<Uuid> =
        notify::best_effort_recipients(enrolled_students(conn, subject.id), "material uploaded")
            .into_iter()
            .map(|student| student.user_id)
            .collect();
    let message = format!("New material uploaded for {}", material.title);
    notify::notify_batch(conn, &recipients, &message);

    Ok(material)
}

pub fn load_material(conn: &mut PgConnection, material_id: Uuid) -> DomainResult<StudyMaterial> {
    study_materials::table
        .find(material_id)
        .first::<StudyMaterial>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("material not found"))
}

fn listing(rows: Vec<(StudyMaterial, String)>) -> Vec<MaterialListing> {
    rows.into_iter()
        .map(|(material, subject_name)| MaterialListing {
            id: material.id,
            subject_id: material.subject_id,
            subject_name,
            semester: material.semester,
            title: material.title,
            description: material.description,
            created_at: material.created_at,
        })
        .collect()
}

pub fn materials_by_faculty(
    conn: &mut PgConnection,
    faculty_id: Uuid,
) -> QueryResult<Vec<MaterialListing>> {
    let rows = study_materials::table
        .inner_join(subjects::table)
        .filter(study_materials::uploaded_by_faculty_id.eq(faculty_id))
        .select((study_materials::all_columns, subjects::subject_name))
        .order(study_materials::created_at.desc())
        .load(conn)?;
    Ok(listing(rows))
}

/// Materials for the student's current course and semester.
pub fn materials_for_student(
    conn: &mut PgConnection,
    student_user_id: Uuid,
) -> DomainResult<Vec<MaterialListing>> {
    let student = student_for_user(conn, student_user_id)?;
    let (Some(course_id), Some(semester)) = (student.course_id, student.semester) else {
        return Ok(Vec::new());
    };
    let rows = study_materials::table
        .inner_join(subjects::table)
        .filter(study_materials::course_id.eq(course_id))
        .filter(study_materials::semester.eq(semester))
        .select((study_materials::all_columns, subjects::subject_name))
        .order(study_materials::created_at.desc())
        .load(conn)?;
    Ok(listing(rows))
}

pub fn all_materials(conn: &mut PgConnection) -> QueryResult<Vec<MaterialListing>> {
    let rows = study_materials::table
        .inner_join(subjects::table)
        .select((study_materials::all_columns, subjects::subject_name))
        .order(study_materials::created_at.desc())
        .load(conn)?;
    Ok(listing(rows))
}

pub fn authorize_download(
    conn: &mut PgConnection,
    role: Role,
    user_id: Uuid,
    material: &StudyMaterial,
) -> DomainResult<()> {
    let allowed = match role {
        Role::Admin => true,
        Role::Faculty => faculty_for_user(conn, user_id)?.id == material.uploaded_by_faculty_id,
        Role::Student => {
            let student = student_for_user(conn, user_id)?;
            student.course_id == Some(material.course_id)
                && student.semester.as_deref() == Some(material.semester.as_str())
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(DomainError::forbidden("not allowed to download this material"))
    }
}

/// Deletes the row and returns the stored file name for blob cleanup.
pub fn delete_material(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    material_id: Uuid,
) -> DomainResult<String> {
    let material = load_material(conn, material_id)?;
    if material.uploaded_by_faculty_id != faculty_id {
        return Err(DomainError::forbidden("only the uploader may delete this material"));
    }
    diesel::delete(study_materials::table.find(material_id)).execute(conn)?;
    Ok(material.file_path)
}

/// Title reduced to a safe download file name.
pub fn download_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
        .collect();
    let cleaned = cleaned.trim();
    let stem = if cleaned.is_empty() { "material" } else { cleaned };
    format!("{stem}.{PDF_EXTENSION}")
}
