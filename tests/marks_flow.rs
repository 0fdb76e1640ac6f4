mod common;

use anyhow::Result;
use axum::http::StatusCode;
use campus::schema::{audit_logs, courses, marks, notifications};
use common::{acquire_db_lock, body_json, Account, TestApp, DEFAULT_PASSWORD, SEMESTER};
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

struct Fixture {
    admin: String,
    faculty: String,
    subject: Uuid,
    exam: Uuid,
    top: Account,
    other: Account,
}

async fn notifications_for(app: &TestApp, user_id: Uuid) -> Result<Vec<String>> {
    app.with_conn(move |conn| {
        Ok(notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.asc())
            .select(notifications::message)
            .load(conn)?)
    })
    .await
}

async fn set_published(app: &TestApp, fx: &Fixture, published: bool) -> Result<()> {
    let response = app
        .post_json(
            &format!("/admin/exams/{}/publish", fx.exam),
            &json!({ "published": published }),
            Some(&fx.admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

async fn setup(app: &TestApp) -> Result<Fixture> {
    app.insert_admin("admin@college.test", "admin-pass-1").await?;
    let admin = app.login("admin@college.test", "admin-pass-1").await?;
    let course = app.insert_course("BSc Maths").await?;
    let subject = app.insert_subject("Algebra", course, SEMESTER).await?;
    let member = app.insert_faculty("Dr. Iyer", "iyer@college.test").await?;
    app.assign(member.id, subject).await?;
    let top = app.insert_student("Meera", "MAT001", course, SEMESTER).await?;
    let other = app.insert_student("Nikhil", "MAT002", course, SEMESTER).await?;
    app.enroll(top.id).await?;
    app.enroll(other.id).await?;

    let response = app
        .post_json(
            "/admin/exams",
            &json!({
                "exam_name": "Midterm",
                "course_id": course,
                "semester": SEMESTER,
                "exam_date": "2025-03-10",
            }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let exam: Uuid = serde_json::from_value(body_json(response).await?["id"].clone())?;
    let faculty = app.login(&member.email, DEFAULT_PASSWORD).await?;

    Ok(Fixture {
        admin,
        faculty,
        subject,
        exam,
        top,
        other,
    })
}

#[tokio::test]
async fn out_of_range_marks_reject_the_whole_batch() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = setup(&app).await?;

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!(88));
    batch.insert(fx.other.id.to_string(), json!(150));
    let response = app
        .post_json(
            &format!("/faculty/marks/{}/{}", fx.exam, fx.subject),
            &json!({ "marks": batch }),
            Some(&fx.faculty),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await?;
    let message = error["error"].as_str().unwrap_or_default();
    assert!(message.contains(&fx.other.id.to_string()), "{message}");

    let stored: i64 = app
        .with_conn(|conn| Ok(marks::table.count().get_result(conn)?))
        .await?;
    assert_eq!(stored, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn students_only_see_published_results() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = setup(&app).await?;

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!("91"));
    batch.insert(fx.other.id.to_string(), json!(""));
    let response = app
        .post_json(
            &format!("/faculty/marks/{}/{}", fx.exam, fx.subject),
            &json!({ "marks": batch }),
            Some(&fx.faculty),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["saved"], 2);

    let student = app.login(&fx.top.email, DEFAULT_PASSWORD).await?;
    let results = body_json(app.get("/student/results", Some(&student)).await?).await?;
    assert_eq!(results.as_array().map(Vec::len), Some(0));
    let draft = body_json(
        app.get(&format!("/student/results/{}", fx.exam), Some(&student))
            .await?,
    )
    .await?;
    assert_eq!(draft.as_array().map(Vec::len), Some(0));

    let response = app
        .post_json(
            &format!("/admin/exams/{}/publish", fx.exam),
            &json!({ "published": true }),
            Some(&fx.admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let results = body_json(app.get("/student/results", Some(&student)).await?).await?;
    assert_eq!(results[0]["exam_name"], "Midterm");
    assert_eq!(results[0]["subjects"][0]["subject_name"], "Algebra");
    assert_eq!(results[0]["subjects"][0]["marks"], 91);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unassigned_faculty_cannot_enter_marks() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = setup(&app).await?;

    let outsider = app.insert_faculty("Dr. Pillai", "pillai@college.test").await?;
    let cookie = app.login(&outsider.email, DEFAULT_PASSWORD).await?;

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!(70));
    let path = format!("/faculty/marks/{}/{}", fx.exam, fx.subject);
    let response = app
        .post_json(&path, &json!({ "marks": batch }), Some(&cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get(&path, Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn draft_marks_notify_nobody_until_publication() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = setup(&app).await?;
    let path = format!("/faculty/marks/{}/{}", fx.exam, fx.subject);

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!(64));
    let response = app
        .post_json(&path, &json!({ "marks": batch }), Some(&fx.faculty))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["notified"], 0);
    assert!(notifications_for(&app, fx.top.user_id).await?.is_empty());

    set_published(&app, &fx, true).await?;
    let received = notifications_for(&app, fx.top.user_id).await?;
    assert_eq!(received.len(), 1);
    assert!(received[0].starts_with("Results for Midterm"), "{}", received[0]);

    // Republishing an already visible exam stays quiet.
    set_published(&app, &fx, true).await?;
    assert_eq!(notifications_for(&app, fx.top.user_id).await?.len(), 1);

    let response = app
        .post_json(&path, &json!({ "marks": {} }), Some(&fx.faculty))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await?;
    assert_eq!(outcome["saved"], 0);
    assert_eq!(outcome["notified"], 0);

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!(71));
    let response = app
        .post_json(&path, &json!({ "marks": batch }), Some(&fx.faculty))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["notified"], 2);
    assert_eq!(notifications_for(&app, fx.top.user_id).await?.len(), 2);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unpublishing_hides_results_again() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = setup(&app).await?;

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!(55));
    let response = app
        .post_json(
            &format!("/faculty/marks/{}/{}", fx.exam, fx.subject),
            &json!({ "marks": batch }),
            Some(&fx.faculty),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let student = app.login(&fx.top.email, DEFAULT_PASSWORD).await?;
    set_published(&app, &fx, true).await?;
    let results = body_json(app.get("/student/results", Some(&student)).await?).await?;
    assert_eq!(results.as_array().map(Vec::len), Some(1));

    set_published(&app, &fx, false).await?;
    let results = body_json(app.get("/student/results", Some(&student)).await?).await?;
    assert_eq!(results.as_array().map(Vec::len), Some(0));
    let detail = body_json(
        app.get(&format!("/student/results/{}", fx.exam), Some(&student))
            .await?,
    )
    .await?;
    assert_eq!(detail.as_array().map(Vec::len), Some(0));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn marks_and_admin_writes_survive_a_broken_notification_sink() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fx = setup(&app).await?;
    set_published(&app, &fx, true).await?;

    app.guard_inserts("notifications", "false").await?;
    app.guard_inserts("audit_logs", "false").await?;

    let mut batch = serde_json::Map::new();
    batch.insert(fx.top.id.to_string(), json!(82));
    let marks_response = app
        .post_json(
            &format!("/faculty/marks/{}/{}", fx.exam, fx.subject),
            &json!({ "marks": batch }),
            Some(&fx.faculty),
        )
        .await;
    let course_response = app
        .post_json(
            "/admin/courses",
            &json!({ "course_name": "BA History", "duration": "3 years" }),
            Some(&fx.admin),
        )
        .await;

    app.lift_guard("notifications").await?;
    app.lift_guard("audit_logs").await?;

    let marks_response = marks_response?;
    assert_eq!(marks_response.status(), StatusCode::OK);
    let outcome = body_json(marks_response).await?;
    assert_eq!(outcome["saved"], 1);
    assert_eq!(outcome["notified"], 0);
    assert_eq!(course_response?.status(), StatusCode::CREATED);

    let top = fx.top.id;
    let (stored, course_rows, audits): (Option<i32>, i64, i64) = app
        .with_conn(move |conn| {
            let stored = marks::table
                .filter(marks::student_id.eq(top))
                .select(marks::mark_value)
                .first(conn)?;
            let course_rows = courses::table
                .filter(courses::course_name.eq("BA History"))
                .count()
                .get_result(conn)?;
            let audits = audit_logs::table
                .filter(audit_logs::table_name.eq("courses"))
                .count()
                .get_result(conn)?;
            Ok((stored, course_rows, audits))
        })
        .await?;
    assert_eq!(stored, Some(82));
    assert_eq!(course_rows, 1);
    assert_eq!(audits, 0);

    app.cleanup().await?;
    Ok(())
}
