mod common;

use anyhow::Result;
use axum::http::StatusCode;
use campus::schema::{attendance, attendance_details};
use common::{acquire_db_lock, body_json, TestApp, DEFAULT_PASSWORD, SEMESTER};
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn one_session_per_subject_and_date() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let course = app.insert_course("BSc Physics").await?;
    let subject = app.insert_subject("Mechanics", course, SEMESTER).await?;
    let member = app.insert_faculty("Dr. Rao", "rao@college.test").await?;
    app.assign(member.id, subject).await?;
    let cookie = app.login(&member.email, DEFAULT_PASSWORD).await?;

    let payload = json!({ "subject_id": subject, "date": "2025-02-03" });
    let response = app.post_json("/faculty/attendance", &payload, Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app.post_json("/faculty/attendance", &payload, Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let sessions: i64 = app
        .with_conn(move |conn| {
            Ok(attendance::table
                .filter(attendance::subject_id.eq(subject))
                .count()
                .get_result(conn)?)
        })
        .await?;
    assert_eq!(sessions, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn marking_writes_a_row_for_every_enrolled_student() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let course = app.insert_course("BSc Physics").await?;
    let subject = app.insert_subject("Mechanics", course, SEMESTER).await?;
    let member = app.insert_faculty("Dr. Rao", "rao@college.test").await?;
    app.assign(member.id, subject).await?;
    let present = app.insert_student("Asha", "PHY001", course, SEMESTER).await?;
    let silent = app.insert_student("Bala", "PHY002", course, SEMESTER).await?;
    app.enroll(present.id).await?;
    app.enroll(silent.id).await?;
    let cookie = app.login(&member.email, DEFAULT_PASSWORD).await?;

    let response = app
        .post_json(
            "/faculty/attendance",
            &json!({ "subject_id": subject, "date": "2025-02-03" }),
            Some(&cookie),
        )
        .await?;
    let session = body_json(response).await?;
    let session_id: Uuid = serde_json::from_value(session["id"].clone())?;

    let mut statuses = serde_json::Map::new();
    statuses.insert(present.id.to_string(), json!(" PRESENT "));
    let response = app
        .post_json(
            &format!("/faculty/attendance/{session_id}"),
            &json!({ "statuses": statuses }),
            Some(&cookie),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["recorded"], 2);

    let rows: Vec<(Uuid, String)> = app
        .with_conn(move |conn| {
            Ok(attendance_details::table
                .filter(attendance_details::attendance_id.eq(session_id))
                .select((attendance_details::student_id, attendance_details::status))
                .load(conn)?)
        })
        .await?;
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&(present.id, "present".to_string())));
    assert!(rows.contains(&(silent.id, "absent".to_string())));

    let student_cookie = app.login(&silent.email, DEFAULT_PASSWORD).await?;
    let summary = body_json(app.get("/student/attendance", Some(&student_cookie)).await?).await?;
    assert_eq!(summary[0]["total_classes"], 1);
    assert_eq!(summary[0]["present_classes"], 0);
    assert_eq!(summary[0]["percent"], 0.0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unassigned_faculty_cannot_open_sessions() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let course = app.insert_course("BSc Physics").await?;
    let subject = app.insert_subject("Mechanics", course, SEMESTER).await?;
    let member = app.insert_faculty("Dr. Rao", "rao@college.test").await?;
    let cookie = app.login(&member.email, DEFAULT_PASSWORD).await?;

    let response = app
        .post_json(
            "/faculty/attendance",
            &json!({ "subject_id": subject, "date": "2025-02-03" }),
            Some(&cookie),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}
