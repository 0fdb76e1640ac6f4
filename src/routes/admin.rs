//! Administrator endpoints. Every handler checks the admin role itself and
//! writes an audit entry after a successful mutation.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{password, AuthenticatedUser, RequestContext, Role},
    domain::{
        academics, attendance, billing,
        enrollment::{self, AutoEnrollOutcome, EnrolledSubject},
        exams, load_student,
        materials::{self, MaterialListing},
        messaging,
        people::{self, FacultyInput, StudentInput},
        settings,
        timetable::{self, TimetableInput, TimetableScope, TimetableSlot},
        validate_semester,
    },
    error::{AppError, AppResult},
    models::{
        AuditLog, Course, Exam, Faculty, Fee, Invoice, Message, Student, Subject,
        SystemSetting, TimetableEntry,
    },
    notify,
    schema::{courses, faculty, invoices, students, subjects},
    state::AppState,
};

fn require_admin(ctx: &RequestContext, state: &AppState) -> AppResult<AuthenticatedUser> {
    ctx.require_role(state, &[Role::Admin])
}

#[derive(Serialize)]
pub struct DashboardCounts {
    pub students: i64,
    pub faculty: i64,
    pub courses: i64,
    pub subjects: i64,
    pub unpaid_invoices: i64,
}

pub async fn dashboard(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<DashboardCounts>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;

    Ok(Json(DashboardCounts {
        students: students::table.select(count_star()).first(&mut conn)?,
        faculty: faculty::table.select(count_star()).first(&mut conn)?,
        courses: courses::table.select(count_star()).first(&mut conn)?,
        subjects: subjects::table.select(count_star()).first(&mut conn)?,
        unpaid_invoices: invoices::table
            .filter(invoices::status.eq(billing::STATUS_UNPAID))
            .select(count_star())
            .first(&mut conn)?,
    }))
}

#[derive(Deserialize, Validate)]
pub struct StudentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub roll_number: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub course_id: Uuid,
    pub semester: String,
    pub is_active: Option<bool>,
}

impl StudentRequest {
    fn input(&self) -> StudentInput {
        StudentInput {
            name: self.name.clone(),
            roll_number: self.roll_number.clone(),
            email: self.email.trim().to_string(),
            phone: self.phone.clone(),
            course_id: self.course_id,
            semester: self.semester.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct ScopeQuery {
    pub course_id: Option<Uuid>,
    pub semester: Option<String>,
}

#[derive(Serialize)]
pub struct StudentView {
    #[serde(flatten)]
    pub student: Student,
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct CreatedAccount<T> {
    #[serde(flatten)]
    pub profile: T,
    pub temporary_password: String,
}

pub async fn list_students(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<StudentView>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let rows = people::list_students(&mut conn, query.course_id, query.semester.as_deref())?;
    Ok(Json(
        rows.into_iter()
            .map(|(student, is_active)| StudentView { student, is_active })
            .collect(),
    ))
}

pub async fn create_student(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<StudentRequest>,
) -> AppResult<(StatusCode, Json<CreatedAccount<Student>>)> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;

    let temporary_password = password::generate_temporary_password();
    let hash = password::hash_password(&temporary_password)?;

    let mut conn = state.db()?;
    let student = people::create_student(&mut conn, &payload.input(), &hash)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "create",
        "students",
        student.id,
        Some(format!("roll_number={}", student.roll_number)),
    );

    info!(student_id = %student.id, "student created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedAccount {
            profile: student,
            temporary_password,
        }),
    ))
}

pub async fn update_student(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(student_id): Path<Uuid>,
    Json(payload): Json<StudentRequest>,
) -> AppResult<Json<Student>> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;

    let mut conn = state.db()?;
    let student = people::update_student(
        &mut conn,
        student_id,
        &payload.input(),
        payload.is_active.unwrap_or(true),
    )?;
    notify::audit_log(&mut conn, Some(admin.user_id), "update", "students", student.id, None);
    Ok(Json(student))
}

pub async fn delete_student(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(student_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let student = people::delete_student(&mut conn, student_id)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "delete",
        "students",
        student.id,
        Some(format!("roll_number={}", student.roll_number)),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Validate)]
pub struct FacultyRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl FacultyRequest {
    fn input(&self) -> FacultyInput {
        FacultyInput {
            name: self.name.clone(),
            email: self.email.trim().to_string(),
            department: self.department.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct FacultyView {
    #[serde(flatten)]
    pub faculty: Faculty,
    pub is_active: bool,
}

pub async fn list_faculty(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<FacultyView>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let rows = people::list_faculty(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|(faculty, is_active)| FacultyView { faculty, is_active })
            .collect(),
    ))
}

pub async fn create_faculty(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<FacultyRequest>,
) -> AppResult<(StatusCode, Json<CreatedAccount<Faculty>>)> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;

    let temporary_password = password::generate_temporary_password();
    let hash = password::hash_password(&temporary_password)?;

    let mut conn = state.db()?;
    let member = people::create_faculty(&mut conn, &payload.input(), &hash)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "create", "faculty", member.id, None);

    info!(faculty_id = %member.id, "faculty member created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedAccount {
            profile: member,
            temporary_password,
        }),
    ))
}

pub async fn update_faculty(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(faculty_id): Path<Uuid>,
    Json(payload): Json<FacultyRequest>,
) -> AppResult<Json<Faculty>> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;

    let mut conn = state.db()?;
    let member = people::update_faculty(
        &mut conn,
        faculty_id,
        &payload.input(),
        payload.is_active.unwrap_or(true),
    )?;
    notify::audit_log(&mut conn, Some(admin.user_id), "update", "faculty", member.id, None);
    Ok(Json(member))
}

pub async fn delete_faculty(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(faculty_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let member = people::delete_faculty(&mut conn, faculty_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "faculty", member.id, None);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

pub async fn set_user_active(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ActiveRequest>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    if admin.user_id == user_id && !payload.is_active {
        return Err(AppError::bad_request("you cannot deactivate your own account"));
    }
    let mut conn = state.db()?;
    people::set_active(&mut conn, user_id, payload.is_active)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        if payload.is_active { "activate" } else { "deactivate" },
        "users",
        user_id,
        None,
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct PasswordResetResponse {
    pub user_id: Uuid,
    pub temporary_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PasswordResetResponse>> {
    let admin = require_admin(&ctx, &state)?;
    let temporary_password = password::generate_temporary_password();
    let hash = password::hash_password(&temporary_password)?;

    let mut conn = state.db()?;
    people::reset_password(&mut conn, user_id, &hash)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "reset_password", "users", user_id, None);

    info!(%user_id, "password reset by admin");
    Ok(Json(PasswordResetResponse {
        user_id,
        temporary_password,
    }))
}

#[derive(Deserialize, Validate)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 100))]
    pub course_name: String,
    #[validate(length(max = 50))]
    pub duration: Option<String>,
}

pub async fn list_courses(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<Course>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(academics::list_courses(&mut conn)?))
}

pub async fn create_course(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<CourseRequest>,
) -> AppResult<(StatusCode, Json<Course>)> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;
    let mut conn = state.db()?;
    let course =
        academics::create_course(&mut conn, &payload.course_name, payload.duration.as_deref())?;
    notify::audit_log(&mut conn, Some(admin.user_id), "create", "courses", course.id, None);
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CourseRequest>,
) -> AppResult<Json<Course>> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;
    let mut conn = state.db()?;
    let course = academics::update_course(
        &mut conn,
        course_id,
        &payload.course_name,
        payload.duration.as_deref(),
    )?;
    notify::audit_log(&mut conn, Some(admin.user_id), "update", "courses", course.id, None);
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(course_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    academics::delete_course(&mut conn, course_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "courses", course_id, None);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Validate)]
pub struct SubjectRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject_name: String,
    pub course_id: Uuid,
    pub semester: String,
}

pub async fn list_subjects(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<Subject>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(academics::list_subjects(
        &mut conn,
        query.course_id,
        query.semester.as_deref(),
    )?))
}

pub async fn create_subject(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<SubjectRequest>,
) -> AppResult<(StatusCode, Json<Subject>)> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;
    let mut conn = state.db()?;
    let subject = academics::create_subject(
        &mut conn,
        &payload.subject_name,
        payload.course_id,
        &payload.semester,
    )?;
    notify::audit_log(&mut conn, Some(admin.user_id), "create", "subjects", subject.id, None);
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn update_subject(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<SubjectRequest>,
) -> AppResult<Json<Subject>> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;
    let mut conn = state.db()?;
    let subject = academics::update_subject(
        &mut conn,
        subject_id,
        &payload.subject_name,
        payload.course_id,
        &payload.semester,
    )?;
    notify::audit_log(&mut conn, Some(admin.user_id), "update", "subjects", subject.id, None);
    Ok(Json(subject))
}

pub async fn delete_subject(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(subject_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    academics::delete_subject(&mut conn, subject_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "subjects", subject_id, None);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<Vec<EnrolledSubject>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    load_student(&mut conn, student_id)?;
    Ok(Json(enrollment::enrollments_for_student(&mut conn, student_id)?))
}

pub async fn auto_enroll(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<AutoEnrollOutcome>> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let outcome = enrollment::auto_enroll(&mut conn, student_id)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "auto_enroll",
        "enrollments",
        student_id,
        Some(format!("matched={} created={}", outcome.matched, outcome.created)),
    );
    Ok(Json(outcome))
}

pub async fn remove_enrollment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((student_id, enrollment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    enrollment::remove_enrollment(&mut conn, student_id, enrollment_id)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "delete",
        "enrollments",
        enrollment_id,
        None,
    );
    Ok(StatusCode::NO_CONTENT)
}

pub async fn student_attendance(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<Vec<attendance::SubjectAttendance>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    load_student(&mut conn, student_id)?;
    Ok(Json(attendance::student_summary(&mut conn, student_id)?))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub subject_ids: Vec<Uuid>,
}

pub async fn faculty_subjects(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(faculty_id): Path<Uuid>,
) -> AppResult<Json<Vec<Subject>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    academics::load_faculty(&mut conn, faculty_id)?;
    Ok(Json(academics::subjects_for_faculty(&mut conn, faculty_id)?))
}

pub async fn assign_subjects(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(faculty_id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<Value>> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let assigned = academics::assign_subjects(&mut conn, faculty_id, &payload.subject_ids)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "assign",
        "faculty_subject",
        faculty_id,
        Some(format!("assigned={assigned}")),
    );
    Ok(Json(json!({ "assigned": assigned })))
}

pub async fn unassign_subject(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((faculty_id, subject_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    academics::unassign_subject(&mut conn, faculty_id, subject_id)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "unassign",
        "faculty_subject",
        faculty_id,
        Some(format!("subject_id={subject_id}")),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct TimetableRequest {
    pub course_id: Uuid,
    pub semester: String,
    pub subject_id: Uuid,
    pub faculty_id: Option<Uuid>,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub room: Option<String>,
}

/// Accepts `HH:MM` as well as `HH:MM:SS`.
fn parse_clock_time(raw: &str, field: &str) -> AppResult<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| AppError::bad_request(format!("{field} must be formatted as HH:MM")))
}

pub async fn list_timetable(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<TimetableSlot>>> {
    require_admin(&ctx, &state)?;
    let semester = query.semester.as_deref().map(validate_semester).transpose()?;
    let scope = match (query.course_id, semester.as_deref()) {
        (Some(course_id), Some(semester)) => TimetableScope::CourseSemester(course_id, semester),
        _ => TimetableScope::All,
    };
    let mut conn = state.db()?;
    Ok(Json(timetable::list_slots(&mut conn, scope)?))
}

pub async fn create_timetable_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<TimetableRequest>,
) -> AppResult<(StatusCode, Json<TimetableEntry>)> {
    let admin = require_admin(&ctx, &state)?;
    let input = TimetableInput {
        course_id: payload.course_id,
        semester: payload.semester,
        subject_id: payload.subject_id,
        faculty_id: payload.faculty_id,
        day_of_week: payload.day_of_week,
        start_time: parse_clock_time(&payload.start_time, "start time")?,
        end_time: parse_clock_time(&payload.end_time, "end time")?,
        room: payload.room,
    };

    let mut conn = state.db()?;
    let entry = timetable::create_entry(&mut conn, &input)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "create", "timetable", entry.id, None);
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn delete_timetable_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(entry_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    timetable::delete_entry(&mut conn, entry_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "timetable", entry_id, None);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Validate)]
pub struct ExamRequest {
    #[validate(length(min = 1, max = 100))]
    pub exam_name: String,
    pub course_id: Uuid,
    pub semester: String,
    pub exam_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

pub async fn list_exams(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<Exam>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(exams::list_exams(
        &mut conn,
        query.course_id,
        query.semester.as_deref(),
    )?))
}

pub async fn create_exam(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<ExamRequest>,
) -> AppResult<(StatusCode, Json<Exam>)> {
    let admin = require_admin(&ctx, &state)?;
    payload.validate()?;
    let mut conn = state.db()?;
    let exam = exams::create_exam(
        &mut conn,
        &payload.exam_name,
        payload.course_id,
        &payload.semester,
        payload.exam_date,
    )?;
    notify::audit_log(&mut conn, Some(admin.user_id), "create", "exams", exam.id, None);
    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn publish_exam(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(exam_id): Path<Uuid>,
    Json(payload): Json<PublishRequest>,
) -> AppResult<Json<Exam>> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let exam = exams::set_published(&mut conn, exam_id, payload.published)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        if exam.is_published { "publish" } else { "unpublish" },
        "exams",
        exam.id,
        None,
    );
    Ok(Json(exam))
}

pub async fn delete_exam(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(exam_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    exams::delete_exam(&mut conn, exam_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "exams", exam_id, None);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct FeeRequest {
    pub course_id: Uuid,
    pub semester: String,
    pub amount: f64,
}

pub async fn list_fees(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<Fee>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(billing::list_fees(&mut conn)?))
}

pub async fn save_fee(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<FeeRequest>,
) -> AppResult<Json<Fee>> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let fee = billing::save_fee(&mut conn, payload.course_id, &payload.semester, payload.amount)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "upsert",
        "fees",
        fee.id,
        Some(format!("amount={}", billing::format_cents(fee.amount_cents))),
    );
    Ok(Json(fee))
}

pub async fn delete_fee(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(fee_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    billing::delete_fee(&mut conn, fee_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "fees", fee_id, None);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct InvoiceRequest {
    pub student_id: Uuid,
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct BulkInvoiceRequest {
    pub course_id: Uuid,
    pub semester: String,
    pub due_date: Option<NaiveDate>,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<InvoiceQuery>,
) -> AppResult<Json<Vec<Invoice>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(billing::list_invoices(&mut conn, query.status.as_deref())?))
}

pub async fn generate_invoice(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<InvoiceRequest>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let invoice = billing::generate_invoice(&mut conn, payload.student_id, payload.due_date)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "create",
        "invoices",
        invoice.id,
        Some(invoice.invoice_no.clone()),
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn generate_bulk_invoices(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<BulkInvoiceRequest>,
) -> AppResult<Json<billing::BulkInvoiceOutcome>> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let outcome = billing::generate_bulk(
        &mut conn,
        payload.course_id,
        &payload.semester,
        payload.due_date,
    )?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "bulk_create",
        "invoices",
        payload.course_id,
        Some(format!(
            "semester={} created={} skipped={}",
            payload.semester.trim(),
            outcome.created,
            outcome.skipped
        )),
    );
    Ok(Json(outcome))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    billing::delete_invoice(&mut conn, invoice_id)?;
    notify::audit_log(&mut conn, Some(admin.user_id), "delete", "invoices", invoice_id, None);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<SystemSetting>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(settings::list_settings(&mut conn)?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<BTreeMap<String, String>>,
) -> AppResult<Json<Vec<SystemSetting>>> {
    let admin = require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    let updated = settings::update_settings(&mut conn, &payload)?;
    notify::audit_log(
        &mut conn,
        Some(admin.user_id),
        "update",
        "system_settings",
        updated,
        Some(payload.keys().cloned().collect::<Vec<_>>().join(",")),
    );
    Ok(Json(settings::list_settings(&mut conn)?))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub table: Option<String>,
    pub limit: Option<i64>,
}

pub async fn audit_logs(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditLog>>> {
    require_admin(&ctx, &state)?;
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let mut conn = state.db()?;
    Ok(Json(notify::recent_audit_logs(
        &mut conn,
        query.table.as_deref(),
        limit,
    )?))
}

pub async fn all_messages(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<Message>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(messaging::list_all(&mut conn, 200)?))
}

pub async fn all_materials(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<MaterialListing>>> {
    require_admin(&ctx, &state)?;
    let mut conn = state.db()?;
    Ok(Json(materials::all_materials(&mut conn)?))
}
