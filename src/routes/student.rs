use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{RequestContext, Role},
    domain::{
        attendance::{self, SubjectAttendance},
        billing,
        enrollment::{self, EnrolledSubject},
        exams::{self, ExamResult, SubjectMark},
        settings, student_for_user,
        timetable::{self, TimetableScope, TimetableSlot},
    },
    error::AppResult,
    models::{Invoice, Payment, Student},
    notify,
    state::AppState,
};

#[derive(Serialize)]
pub struct StudentDashboard {
    pub profile: Student,
    pub enrolled_subjects: usize,
    pub unpaid_invoices: usize,
    pub unread_notifications: usize,
}

pub async fn dashboard(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<StudentDashboard>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let profile = student_for_user(&mut conn, user.user_id)?;

    let enrolled_subjects = enrollment::enrollments_for_student(&mut conn, profile.id)?.len();
    let unpaid_invoices = billing::invoices_for_student(&mut conn, profile.id)?
        .iter()
        .filter(|invoice| invoice.status == billing::STATUS_UNPAID)
        .count();
    let unread_notifications = notify::list_for_user(&mut conn, user.user_id, 100)?
        .iter()
        .filter(|notification| !notification.is_read)
        .count();

    Ok(Json(StudentDashboard {
        profile,
        enrolled_subjects,
        unpaid_invoices,
        unread_notifications,
    }))
}

pub async fn enrollments(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<EnrolledSubject>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    Ok(Json(enrollment::enrollments_for_student(&mut conn, student.id)?))
}

pub async fn attendance_summary(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<SubjectAttendance>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    Ok(Json(attendance::student_summary(&mut conn, student.id)?))
}

pub async fn results(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<ExamResult>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    Ok(Json(exams::published_results(&mut conn, &student)?))
}

pub async fn exam_marks(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(exam_id): Path<Uuid>,
) -> AppResult<Json<Vec<SubjectMark>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    Ok(Json(exams::exam_marks(&mut conn, &student, exam_id)?))
}

#[derive(Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub amount_due: String,
    pub currency: String,
}

pub async fn invoices(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<InvoiceView>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    let currency = settings::currency(&mut conn);

    let rows = billing::invoices_for_student(&mut conn, student.id)?
        .into_iter()
        .map(|invoice| InvoiceView {
            amount_due: billing::format_cents(invoice.amount_due_cents),
            currency: currency.clone(),
            invoice,
        })
        .collect();
    Ok(Json(rows))
}

pub async fn pay_invoice(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    let payment = billing::pay_invoice(&mut conn, invoice_id, student.id)?;

    info!(%invoice_id, payment_id = %payment.id, "student paid invoice");
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn timetable(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<TimetableSlot>>> {
    let user = ctx.require_role(&state, &[Role::Student])?;
    let mut conn = state.db()?;
    let student = student_for_user(&mut conn, user.user_id)?;
    let (Some(course_id), Some(semester)) = (student.course_id, student.semester.as_deref())
    else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(timetable::list_slots(
        &mut conn,
        TimetableScope::CourseSemester(course_id, semester),
    )?))
}
