use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub session_token: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub session_token: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = sessions)]
#[diesel(belongs_to(User))]
pub struct Session {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub session_token: Uuid,
    pub created_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub session_token: Uuid,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = courses)]
pub struct Course {
    pub id: Uuid,
    pub course_name: String,
    pub duration: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = courses)]
pub struct NewCourse {
    pub id: Uuid,
    pub course_name: String,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable, Associations)]
#[diesel(table_name = subjects)]
#[diesel(belongs_to(Course))]
pub struct Subject {
    pub id: Uuid,
    pub subject_name: String,
    pub course_id: Uuid,
    pub semester: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = subjects)]
pub struct NewSubject {
    pub id: Uuid,
    pub subject_name: String,
    pub course_id: Uuid,
    pub semester: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable, Associations)]
#[diesel(table_name = students)]
#[diesel(belongs_to(User))]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub phone: Option<String>,
    pub course_id: Option<Uuid>,
    pub semester: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = students)]
pub struct NewStudent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub phone: Option<String>,
    pub course_id: Option<Uuid>,
    pub semester: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable, Associations)]
#[diesel(table_name = faculty)]
#[diesel(belongs_to(User))]
pub struct Faculty {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = faculty)]
pub struct NewFaculty {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable, Associations)]
#[diesel(table_name = enrollments)]
#[diesel(belongs_to(Student))]
#[diesel(belongs_to(Subject))]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = enrollments)]
pub struct NewEnrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = faculty_subject)]
pub struct NewFacultySubject {
    pub faculty_id: Uuid,
    pub subject_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = timetable)]
pub struct TimetableEntry {
    pub id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub subject_id: Uuid,
    pub faculty_id: Option<Uuid>,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = timetable)]
pub struct NewTimetableEntry {
    pub id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub subject_id: Uuid,
    pub faculty_id: Option<Uuid>,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = attendance)]
pub struct AttendanceSession {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub date: NaiveDate,
    pub created_by_faculty_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attendance)]
pub struct NewAttendanceSession {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub date: NaiveDate,
    pub created_by_faculty_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = attendance_details)]
pub struct AttendanceDetail {
    pub id: Uuid,
    pub attendance_id: Uuid,
    pub student_id: Uuid,
    pub status: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attendance_details)]
pub struct NewAttendanceDetail {
    pub id: Uuid,
    pub attendance_id: Uuid,
    pub student_id: Uuid,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = exams)]
pub struct Exam {
    pub id: Uuid,
    pub exam_name: String,
    pub course_id: Uuid,
    pub semester: String,
    pub exam_date: Option<NaiveDate>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = exams)]
pub struct NewExam {
    pub id: Uuid,
    pub exam_name: String,
    pub course_id: Uuid,
    pub semester: String,
    pub exam_date: Option<NaiveDate>,
    pub is_published: bool,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = marks)]
pub struct Mark {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    #[diesel(column_name = mark_value)]
    pub marks: Option<i32>,
    pub entered_by_faculty_id: Option<Uuid>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = marks)]
pub struct NewMark {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    #[diesel(column_name = mark_value)]
    pub marks: Option<i32>,
    pub entered_by_faculty_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = fees)]
pub struct Fee {
    pub id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub amount_cents: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = fees)]
pub struct NewFee {
    pub id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = invoices)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_no: String,
    pub student_id: Uuid,
    pub fee_id: Uuid,
    pub amount_due_cents: i64,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoices)]
pub struct NewInvoice {
    pub id: Uuid,
    pub invoice_no: String,
    pub student_id: Uuid,
    pub fee_id: Uuid,
    pub amount_due_cents: i64,
    pub due_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub fee_id: Uuid,
    pub amount_cents: i64,
    pub status: String,
    pub payment_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub fee_id: Uuid,
    pub amount_cents: i64,
    pub status: String,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = audit_logs)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: String,
    pub record_id: String,
    pub details: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: String,
    pub record_id: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub sender_user_id: Uuid,
    pub receiver_user_id: Uuid,
    pub subject: Option<String>,
    pub body: String,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub id: Uuid,
    pub sender_user_id: Uuid,
    pub receiver_user_id: Uuid,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Identifiable)]
#[diesel(table_name = study_materials)]
pub struct StudyMaterial {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub uploaded_by_faculty_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub file_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = study_materials)]
pub struct NewStudyMaterial {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub course_id: Uuid,
    pub semester: String,
    pub uploaded_by_faculty_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = system_settings)]
pub struct SystemSetting {
    pub setting_key: String,
    pub setting_value: String,
    pub updated_at: NaiveDateTime,
}
