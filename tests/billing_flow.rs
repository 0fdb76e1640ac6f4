mod common;

use anyhow::{anyhow, Result};
use axum::http::StatusCode;
use campus::domain::billing;
use campus::schema::{invoices, payments};
use common::{acquire_db_lock, body_json, TestApp, DEFAULT_PASSWORD, SEMESTER};
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

async fn admin_with_fee(app: &TestApp) -> Result<(String, Uuid)> {
    app.insert_admin("admin@college.test", "admin-pass-1").await?;
    let admin = app.login("admin@college.test", "admin-pass-1").await?;
    let course = app.insert_course("BCom").await?;
    let response = app
        .post_json(
            "/admin/fees",
            &json!({ "course_id": course, "semester": SEMESTER, "amount": 1250.50 }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let fee = body_json(response).await?;
    assert_eq!(fee["amount_cents"], 125_050);
    Ok((admin, course))
}

#[tokio::test]
async fn second_unpaid_invoice_is_a_conflict() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (admin, course) = admin_with_fee(&app).await?;
    let student = app.insert_student("Kiran", "COM001", course, SEMESTER).await?;

    let payload = json!({ "student_id": student.id, "due_date": "2025-04-30" });
    let response = app.post_json("/admin/invoices", &payload, Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invoice = body_json(response).await?;
    let invoice_no = invoice["invoice_no"].as_str().unwrap_or_default();
    assert!(invoice_no.starts_with("INV-"), "{invoice_no}");
    assert!(invoice_no.ends_with("-0001"), "{invoice_no}");

    let response = app.post_json("/admin/invoices", &payload, Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let issued: i64 = app
        .with_conn(|conn| Ok(invoices::table.count().get_result(conn)?))
        .await?;
    assert_eq!(issued, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn bulk_invoicing_skips_students_with_unpaid_invoices() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (admin, course) = admin_with_fee(&app).await?;
    let billed = app.insert_student("Kiran", "COM001", course, SEMESTER).await?;
    app.insert_student("Lata", "COM002", course, SEMESTER).await?;

    let response = app
        .post_json(
            "/admin/invoices",
            &json!({ "student_id": billed.id }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json(
            "/admin/invoices/bulk",
            &json!({ "course_id": course, "semester": SEMESTER }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await?;
    assert_eq!(outcome["created"], 1);
    assert_eq!(outcome["skipped"], 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn an_invoice_can_be_paid_once() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (admin, course) = admin_with_fee(&app).await?;
    let student = app.insert_student("Kiran", "COM001", course, SEMESTER).await?;
    let stranger = app.insert_student("Lata", "COM002", course, SEMESTER).await?;

    let response = app
        .post_json(
            "/admin/invoices",
            &json!({ "student_id": student.id }),
            Some(&admin),
        )
        .await?;
    let invoice_id: Uuid = serde_json::from_value(body_json(response).await?["id"].clone())?;
    let pay_path = format!("/student/invoices/{invoice_id}/pay");

    let stranger_cookie = app.login(&stranger.email, DEFAULT_PASSWORD).await?;
    let response = app.post_json(&pay_path, &json!({}), Some(&stranger_cookie)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let cookie = app.login(&student.email, DEFAULT_PASSWORD).await?;
    let listed = body_json(app.get("/student/invoices", Some(&cookie)).await?).await?;
    assert_eq!(listed[0]["amount_due"], "1250.50");
    assert_eq!(listed[0]["status"], "unpaid");

    let response = app.post_json(&pay_path, &json!({}), Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app.post_json(&pay_path, &json!({}), Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let (status, paid): (String, i64) = app
        .with_conn(move |conn| {
            let status = invoices::table
                .find(invoice_id)
                .select(invoices::status)
                .first(conn)?;
            let paid = payments::table
                .filter(payments::invoice_id.eq(invoice_id))
                .count()
                .get_result(conn)?;
            Ok((status, paid))
        })
        .await?;
    assert_eq!(status, "paid");
    assert_eq!(paid, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn numbering_continues_after_older_invoices_are_deleted() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (admin, course) = admin_with_fee(&app).await?;
    let student = app.insert_student("Kiran", "COM001", course, SEMESTER).await?;
    let student_id = student.id;

    app.with_conn(move |conn| {
        for _ in 0..25 {
            let invoice = billing::generate_invoice(conn, student_id, None)
                .map_err(|err| anyhow!("{err}"))?;
            diesel::update(invoices::table.find(invoice.id))
                .set(invoices::status.eq("paid"))
                .execute(conn)?;
        }
        let oldest: Vec<Uuid> = invoices::table
            .order(invoices::invoice_no.asc())
            .select(invoices::id)
            .limit(21)
            .load(conn)?;
        diesel::delete(invoices::table.filter(invoices::id.eq_any(&oldest))).execute(conn)?;
        Ok(())
    })
    .await?;

    let response = app
        .post_json(
            "/admin/invoices",
            &json!({ "student_id": student.id }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invoice = body_json(response).await?;
    let invoice_no = invoice["invoice_no"].as_str().unwrap_or_default();
    assert!(invoice_no.ends_with("-0026"), "{invoice_no}");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn bulk_invoicing_is_all_or_nothing() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (admin, course) = admin_with_fee(&app).await?;
    app.insert_student("Kiran", "COM001", course, SEMESTER).await?;
    let refused = app.insert_student("Lata", "COM002", course, SEMESTER).await?;

    app.guard_inserts("invoices", &format!("student_id <> '{}'", refused.id))
        .await?;
    let response = app
        .post_json(
            "/admin/invoices/bulk",
            &json!({ "course_id": course, "semester": SEMESTER }),
            Some(&admin),
        )
        .await;
    app.lift_guard("invoices").await?;
    assert_eq!(response?.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let issued: i64 = app
        .with_conn(|conn| Ok(invoices::table.count().get_result(conn)?))
        .await?;
    assert_eq!(issued, 0);

    app.cleanup().await?;
    Ok(())
}
