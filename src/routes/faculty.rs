use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{RequestContext, Role},
    domain::{
        academics,
        attendance::{self, SheetRow},
        exams::{self, MarkSheetRow, MarksSaved},
        faculty_for_user, load_subject, require_assignment,
        timetable::{self, TimetableScope, TimetableSlot},
    },
    error::AppResult,
    models::{AttendanceSession, Exam, Faculty, Subject},
    state::AppState,
};

#[derive(Serialize)]
pub struct FacultyDashboard {
    pub profile: Faculty,
    pub subjects: Vec<Subject>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<FacultyDashboard>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let profile = faculty_for_user(&mut conn, user.user_id)?;
    let subjects = academics::subjects_for_faculty(&mut conn, profile.id)?;
    Ok(Json(FacultyDashboard { profile, subjects }))
}

pub async fn assigned_subjects(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<Subject>>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    Ok(Json(academics::subjects_for_faculty(&mut conn, member.id)?))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub subject_id: Uuid,
    pub date: NaiveDate,
}

pub async fn create_attendance_session(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<AttendanceSession>)> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    let session =
        attendance::create_session(&mut conn, payload.subject_id, payload.date, member.id)?;

    info!(attendance_id = %session.id, subject_id = %session.subject_id, "attendance session opened");
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Serialize)]
pub struct AttendanceSheet {
    pub session: AttendanceSession,
    pub students: Vec<SheetRow>,
}

pub async fn attendance_sheet(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(attendance_id): Path<Uuid>,
) -> AppResult<Json<AttendanceSheet>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    let (session, students) = attendance::attendance_sheet(&mut conn, attendance_id, member.id)?;
    Ok(Json(AttendanceSheet { session, students }))
}

#[derive(Deserialize)]
pub struct MarkAttendanceRequest {
    #[serde(default)]
    pub statuses: HashMap<Uuid, String>,
}

#[derive(Serialize)]
pub struct MarkAttendanceResponse {
    pub recorded: usize,
}

pub async fn mark_attendance(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(attendance_id): Path<Uuid>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> AppResult<Json<MarkAttendanceResponse>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    let recorded =
        attendance::mark_attendance(&mut conn, attendance_id, member.id, &payload.statuses)?;

    info!(%attendance_id, recorded, "attendance saved");
    Ok(Json(MarkAttendanceResponse { recorded }))
}

pub async fn subject_exams(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(subject_id): Path<Uuid>,
) -> AppResult<Json<Vec<Exam>>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    require_assignment(&mut conn, member.id, subject_id)?;
    let subject = load_subject(&mut conn, subject_id)?;
    Ok(Json(exams::exams_for_subject(&mut conn, &subject)?))
}

pub async fn marks_sheet(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((exam_id, subject_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<MarkSheetRow>>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    Ok(Json(exams::marks_sheet(
        &mut conn, exam_id, subject_id, member.id,
    )?))
}

#[derive(Deserialize)]
pub struct EnterMarksRequest {
    pub marks: HashMap<Uuid, Value>,
}

pub async fn enter_marks(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((exam_id, subject_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<EnterMarksRequest>,
) -> AppResult<Json<MarksSaved>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    let saved = exams::enter_marks(&mut conn, exam_id, subject_id, member.id, &payload.marks)?;

    info!(%exam_id, %subject_id, saved = saved.saved, "marks saved");
    Ok(Json(saved))
}

pub async fn timetable(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<TimetableSlot>>> {
    let user = ctx.require_role(&state, &[Role::Faculty])?;
    let mut conn = state.db()?;
    let member = faculty_for_user(&mut conn, user.user_id)?;
    Ok(Json(timetable::list_slots(
        &mut conn,
        TimetableScope::Faculty(member.id),
    )?))
}
