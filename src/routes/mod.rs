use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod faculty;
pub mod health;
pub mod materials;
pub mod messages;
pub mod notifications;
pub mod student;

/// Room for multipart framing and the text fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

fn cors_layer(state: &AppState) -> CorsLayer {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => AllowOrigin::list(origins.split(',').filter_map(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed
                .parse::<HeaderValue>()
                .map_err(|err| warn!(origin = trimmed, error = %err, "ignoring invalid CORS origin"))
                .ok()
        })),
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route(
            "/students",
            get(admin::list_students).post(admin::create_student),
        )
        .route(
            "/students/:id",
            put(admin::update_student).delete(admin::delete_student),
        )
        .route("/students/:id/enrollments", get(admin::list_enrollments))
        .route("/students/:id/auto-enroll", post(admin::auto_enroll))
        .route(
            "/students/:id/enrollments/:enrollment_id",
            delete(admin::remove_enrollment),
        )
        .route("/students/:id/attendance", get(admin::student_attendance))
        .route(
            "/faculty",
            get(admin::list_faculty).post(admin::create_faculty),
        )
        .route(
            "/faculty/:id",
            put(admin::update_faculty).delete(admin::delete_faculty),
        )
        .route(
            "/faculty/:id/subjects",
            get(admin::faculty_subjects).post(admin::assign_subjects),
        )
        .route(
            "/faculty/:id/subjects/:subject_id",
            delete(admin::unassign_subject),
        )
        .route("/users/:id/active", post(admin::set_user_active))
        .route("/users/:id/reset-password", post(admin::reset_password))
        .route(
            "/courses",
            get(admin::list_courses).post(admin::create_course),
        )
        .route(
            "/courses/:id",
            put(admin::update_course).delete(admin::delete_course),
        )
        .route(
            "/subjects",
            get(admin::list_subjects).post(admin::create_subject),
        )
        .route(
            "/subjects/:id",
            put(admin::update_subject).delete(admin::delete_subject),
        )
        .route(
            "/timetable",
            get(admin::list_timetable).post(admin::create_timetable_entry),
        )
        .route("/timetable/:id", delete(admin::delete_timetable_entry))
        .route("/exams", get(admin::list_exams).post(admin::create_exam))
        .route("/exams/:id", delete(admin::delete_exam))
        .route("/exams/:id/publish", post(admin::publish_exam))
        .route("/fees", get(admin::list_fees).post(admin::save_fee))
        .route("/fees/:id", delete(admin::delete_fee))
        .route(
            "/invoices",
            get(admin::list_invoices).post(admin::generate_invoice),
        )
        .route("/invoices/bulk", post(admin::generate_bulk_invoices))
        .route("/invoices/:id", delete(admin::delete_invoice))
        .route(
            "/settings",
            get(admin::list_settings).put(admin::update_settings),
        )
        .route("/audit-logs", get(admin::audit_logs))
        .route("/messages", get(admin::all_messages))
        .route("/materials", get(admin::all_materials));

    let faculty_routes = Router::new()
        .route("/dashboard", get(faculty::dashboard))
        .route("/subjects", get(faculty::assigned_subjects))
        .route("/subjects/:id/exams", get(faculty::subject_exams))
        .route("/attendance", post(faculty::create_attendance_session))
        .route(
            "/attendance/:id",
            get(faculty::attendance_sheet).post(faculty::mark_attendance),
        )
        .route(
            "/marks/:exam_id/:subject_id",
            get(faculty::marks_sheet).post(faculty::enter_marks),
        )
        .route(
            "/materials",
            get(materials::faculty_materials).post(materials::upload_material),
        )
        .route("/materials/:id", delete(materials::delete_material))
        .route("/timetable", get(faculty::timetable));

    let student_routes = Router::new()
        .route("/dashboard", get(student::dashboard))
        .route("/enrollments", get(student::enrollments))
        .route("/attendance", get(student::attendance_summary))
        .route("/results", get(student::results))
        .route("/results/:exam_id", get(student::exam_marks))
        .route("/invoices", get(student::invoices))
        .route("/invoices/:id/pay", post(student::pay_invoice))
        .route("/materials", get(materials::student_materials))
        .route("/timetable", get(student::timetable));

    let message_routes = Router::new()
        .route("/", get(messages::mailbox).post(messages::send_message))
        .route("/contacts", get(messages::contacts))
        .route("/:id/read", post(messages::read_message));

    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/settings/password", post(auth::change_password))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/:id/read",
            post(notifications::mark_notification_read),
        )
        .route("/materials/:id/download", get(materials::download_material))
        .route("/api/health", get(health::health_check))
        .nest("/admin", admin_routes)
        .nest("/faculty", faculty_routes)
        .nest("/student", student_routes)
        .nest("/messages", message_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
