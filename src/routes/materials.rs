use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::Response,
    Json,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{RequestContext, Role},
    domain::{
        faculty_for_user,
        materials::{self, MaterialListing, MaterialUpload, PDF_EXTENSION},
        require_assignment,
    },
    error::{AppError, AppResult},
    models::StudyMaterial,
    state::AppState,
    storage::StorageError,
};

fn attachment_disposition(filename: &str) -> Option<HeaderValue> {
    let encoded =
        percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    HeaderValue::from_str(&format!(
        "attachment; filename=\"{filename}\"; filename*=UTF-8''{encoded}"
    ))
    .ok()
}

fn multipart_error(err: impl std::fmt::Display) -> AppError {
    error!(error = %err, "invalid multipart data");
    AppError::bad_request(format!("invalid multipart data: {err}"))
}

pub async fn upload_material(
    State(state): State<AppState>,
    ctx: RequestContext,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<StudyMaterial>)> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut subject_id: Option<Uuid> = None;
    let mut title = String::new();
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(|n| n.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                file_bytes = Some(data.to_vec());
            }
            Some("subject_id") => {
                let value = field.text().await.map_err(multipart_error)?;
                let parsed = Uuid::parse_str(value.trim())
                    .map_err(|_| AppError::bad_request("subject_id must be a valid UUID"))?;
                subject_id = Some(parsed);
            }
            Some("title") => title = field.text().await.map_err(multipart_error)?,
            Some("description") => {
                description = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let subject_id =
        subject_id.ok_or_else(|| AppError::bad_request("subject and title are required"))?;
    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    let file_name = file_name.unwrap_or_default();
    materials::validate_pdf_upload(&file_name, &file_bytes, state.config.max_upload_bytes)?;

    let faculty_id = {
        let mut conn = state.db()?;
        let member = faculty_for_user(&mut conn, user.user_id)?;
        require_assignment(&mut conn, member.id, subject_id)?;
        member.id
    };

    let stored_name = state
        .storage
        .put(file_bytes, PDF_EXTENSION)
        .await
        .map_err(AppError::internal)?;

    let mut conn = state.db()?;
    let recorded = materials::record_material(
        &mut conn,
        faculty_id,
        MaterialUpload {
            subject_id,
            title: &title,
            description: description.as_deref(),
            stored_name: stored_name.clone(),
        },
    );
    drop(conn);

    match recorded {
        Ok(material) => {
            info!(material_id = %material.id, %subject_id, "study material uploaded");
            Ok((StatusCode::CREATED, Json(material)))
        }
        Err(err) => {
            if let Err(cleanup) = state.storage.delete(&stored_name).await {
                warn!(error = %cleanup, %stored_name, "failed to remove orphaned upload");
            }
            Err(err.into())
        }
    }
}

pub async fn faculty_materials(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<MaterialListing>>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    Ok(Json(materials::materials_by_faculty(&mut conn, member.id)?))
}

pub async fn student_materials(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<MaterialListing>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    Ok(Json(materials::materials_for_student(&mut conn, user.user_id)?))
}

pub async fn delete_material(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(material_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let stored_name = {
        let mut conn = state.db()?;
        let member = faculty_for_user(&mut conn, user.user_id)?;
        materials::delete_material(&mut conn, member.id, material_id)?
    };

    if let Err(err) = state.storage.delete(&stored_name).await {
        warn!(error = %err, %material_id, "failed to remove stored material file");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_material(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(material_id): Path<Uuid>,
) -> AppResult<Response> {
    let user = ctx.require_login(&state)?;
    let material = {
        let mut conn = state.db()?;
        let material = materials::load_material(&mut conn, material_id)?;
        materials::authorize_download(&mut conn, user.role, user.user_id, &material)?;
        material
    };

    let bytes = match state.storage.read(&material.file_path).await {
        Ok(bytes) => bytes,
        Err(StorageError::Missing) => return Err(AppError::not_found()),
        Err(StorageError::OutsideRoot) => {
            warn!(%material_id, "stored path escapes the materials directory");
            return Err(AppError::not_found());
        }
        Err(err) => return Err(AppError::internal(err)),
    };

    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    if let Some(disposition) =
        attachment_disposition(&materials::download_file_name(&material.title))
    {
        headers.insert(CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}
