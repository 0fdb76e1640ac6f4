mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, location, TestApp, DEFAULT_PASSWORD, SEMESTER};
use serde_json::json;

#[tokio::test]
async fn login_me_and_logout() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("admin@college.test", "admin-pass-1").await?;
    let cookie = app.login("admin@college.test", "admin-pass-1").await?;

    let response = app.get("/me", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await?;
    assert_eq!(me["email"], "admin@college.test");
    assert_eq!(me["role"], "admin");

    let response = app.post_json("/logout", &json!({}), Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/me", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_missing_cookie_are_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("admin@college.test", "admin-pass-1").await?;
    let response = app
        .post_json(
            "/login",
            &json!({ "email": "admin@college.test", "password": "nope-nope" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/admin/dashboard", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn student_cannot_reach_admin_pages() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let course = app.insert_course("BSc Physics").await?;
    let student = app.insert_student("Asha", "PHY001", course, SEMESTER).await?;
    let cookie = app.login(&student.email, DEFAULT_PASSWORD).await?;

    let response = app.get("/admin/dashboard", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.get("/student/dashboard", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn admin_reset_logs_the_user_out_everywhere() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("admin@college.test", "admin-pass-1").await?;
    let admin = app.login("admin@college.test", "admin-pass-1").await?;
    let course = app.insert_course("BSc Physics").await?;
    let student = app.insert_student("Asha", "PHY001", course, SEMESTER).await?;
    let student_cookie = app.login(&student.email, DEFAULT_PASSWORD).await?;

    let response = app
        .post_json(
            &format!("/admin/users/{}/reset-password", student.user_id),
            &json!({}),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let reset = body_json(response).await?;
    let temporary = reset["temporary_password"]
        .as_str()
        .expect("temporary password")
        .to_string();

    let response = app.get("/student/dashboard", Some(&student_cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let response = app
        .post_json(
            "/login",
            &json!({ "email": student.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    app.login(&student.email, &temporary).await?;

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn deactivated_users_lose_access() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("admin@college.test", "admin-pass-1").await?;
    let admin = app.login("admin@college.test", "admin-pass-1").await?;
    let member = app.insert_faculty("Dr. Rao", "rao@college.test").await?;
    let faculty_cookie = app.login(&member.email, DEFAULT_PASSWORD).await?;

    let response = app
        .post_json(
            &format!("/admin/users/{}/active", member.user_id),
            &json!({ "is_active": false }),
            Some(&admin),
        )
        .await?;
    assert!(response.status().is_success());

    let response = app.get("/faculty/dashboard", Some(&faculty_cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .post_json(
            "/login",
            &json!({ "email": member.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn changing_password_keeps_only_the_current_session() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let course = app.insert_course("BSc Physics").await?;
    let student = app.insert_student("Asha", "PHY001", course, SEMESTER).await?;
    let current = app.login(&student.email, DEFAULT_PASSWORD).await?;
    let other_device = app.login(&student.email, DEFAULT_PASSWORD).await?;

    let response = app
        .post_json(
            "/settings/password",
            &json!({
                "current_password": "wrong-password",
                "new_password": "fresh-password-9",
                "confirm_password": "fresh-password-9",
            }),
            Some(&current),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/settings/password",
            &json!({
                "current_password": DEFAULT_PASSWORD,
                "new_password": "fresh-password-9",
                "confirm_password": "fresh-password-9",
            }),
            Some(&current),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/me", Some(&current)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get("/me", Some(&other_device)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    app.login(&student.email, "fresh-password-9").await?;

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn admin_accounts_need_a_real_email() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let refused = app.insert_admin("root", "admin-pass-1").await;
    assert!(refused.is_err());
    let message = refused.err().map(|err| err.to_string()).unwrap_or_default();
    assert!(message.contains("valid address"), "{message}");

    let response = app
        .post_json(
            "/login",
            &json!({ "email": "root", "password": "admin-pass-1" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}
