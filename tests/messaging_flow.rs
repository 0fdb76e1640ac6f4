mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, TestApp, DEFAULT_PASSWORD, SEMESTER};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn students_write_to_faculty_of_their_subjects() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let course = app.insert_course("BA History").await?;
    let subject = app.insert_subject("Ancient India", course, SEMESTER).await?;
    let lecturer = app.insert_faculty("Dr. Khan", "khan@college.test").await?;
    app.assign(lecturer.id, subject).await?;
    let unrelated = app.insert_faculty("Dr. Bose", "bose@college.test").await?;
    let student = app.insert_student("Zoya", "HIS001", course, SEMESTER).await?;
    app.enroll(student.id).await?;

    let cookie = app.login(&student.email, DEFAULT_PASSWORD).await?;
    let contacts = body_json(app.get("/messages/contacts", Some(&cookie)).await?).await?;
    assert_eq!(contacts.as_array().map(Vec::len), Some(1));
    assert_eq!(contacts[0]["user_id"], json!(lecturer.user_id));

    let response = app
        .post_json(
            "/messages",
            &json!({ "receiver_user_id": unrelated.user_id, "body": "hello" }),
            Some(&cookie),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(
            "/messages",
            &json!({ "receiver_user_id": student.user_id, "body": "note to self" }),
            Some(&cookie),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/messages",
            &json!({
                "receiver_user_id": lecturer.user_id,
                "subject": "Assignment",
                "body": "Could I have an extension?",
            }),
            Some(&cookie),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let message_id: Uuid = serde_json::from_value(body_json(response).await?["id"].clone())?;

    let response = app
        .post_json(&format!("/messages/{message_id}/read"), &json!({}), Some(&cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let faculty = app.login(&lecturer.email, DEFAULT_PASSWORD).await?;
    let mailbox = body_json(app.get("/messages", Some(&faculty)).await?).await?;
    assert_eq!(mailbox["inbox"][0]["counterpart_email"], student.email.as_str());
    assert_eq!(mailbox["inbox"][0]["is_read"], false);

    let response = app
        .post_json(&format!("/messages/{message_id}/read"), &json!({}), Some(&faculty))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["is_read"], true);

    app.cleanup().await?;
    Ok(())
}
