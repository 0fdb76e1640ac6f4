//! Fee structures, invoices and payments.
//!
//! Invoices move `unpaid -> paid` only. A student holds at most one unpaid
//! invoice per fee; the partial unique index `invoices_one_unpaid_per_fee`
//! backs the check done here.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::{select, PgConnection};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::academics::load_course;
use super::settings::currency;
use super::{is_unique_violation, load_student, validate_semester, DomainError, DomainResult};
use crate::models::{Fee, Invoice, NewFee, NewInvoice, NewPayment, Payment};
use crate::notify;
use crate::schema::{fees, invoices, payments, students};

pub const STATUS_UNPAID: &str = "unpaid";
pub const STATUS_PAID: &str = "paid";
pub const INVOICE_STATUSES: [&str; 4] = ["unpaid", "paid", "overdue", "cancelled"];

const INVOICE_NO_KEY: &str = "invoices_invoice_no_key";
const ONE_UNPAID_INDEX: &str = "invoices_one_unpaid_per_fee";
const MAX_INVOICE_NO_ATTEMPTS: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkInvoiceOutcome {
    pub created: usize,
    pub skipped: usize,
}

/// Converts a decimal amount to cents; rejects negatives and non-finite input.
pub fn amount_to_cents(amount: f64) -> DomainResult<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(DomainError::invalid_input(
            "amount must be a non-negative number",
        ));
    }
    let cents = (amount * 100.0).round();
    if cents > i64::MAX as f64 {
        return Err(DomainError::invalid_input("amount is too large"));
    }
    Ok(cents as i64)
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub fn invoice_prefix(day: NaiveDate) -> String {
    format!("INV-{}-", day.format("%Y%m%d"))
}

pub fn format_invoice_no(prefix: &str, seq: i64) -> String {
    format!("{prefix}{seq:04}")
}

/// Largest numeric suffix among `issued` numbers carrying `prefix`, or 0.
pub fn highest_sequence<'a>(prefix: &str, issued: impl IntoIterator<Item = &'a str>) -> i64 {
    issued
        .into_iter()
        .filter_map(|invoice_no| invoice_no.strip_prefix(prefix))
        .filter_map(|tail| tail.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
}

pub fn list_fees(conn: &mut PgConnection) -> QueryResult<Vec<Fee>> {
    fees::table
        .order((fees::course_id.asc(), fees::semester.asc()))
        .load(conn)
}

/// Inserts or re-prices the fee for a (course, semester).
pub fn save_fee(
    conn: &mut PgConnection,
    course_id: Uuid,
    semester: &str,
    amount: f64,
) -> DomainResult<Fee> {
    let semester = validate_semester(semester)?;
    let amount_cents = amount_to_cents(amount)?;
    load_course(conn, course_id)?;

    let fee = diesel::insert_into(fees::table)
        .values(&NewFee {
            id: Uuid::new_v4(),
            course_id,
            semester,
            amount_cents,
        })
        .on_conflict((fees::course_id, fees::semester))
        .do_update()
        .set(fees::amount_cents.eq(excluded(fees::amount_cents)))
        .get_result::<Fee>(conn)?;
    Ok(fee)
}

pub fn delete_fee(conn: &mut PgConnection, fee_id: Uuid) -> DomainResult<()> {
    let deleted = diesel::delete(fees::table.find(fee_id)).execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("fee structure not found"));
    }
    Ok(())
}

fn fee_for(conn: &mut PgConnection, course_id: Uuid, semester: &str) -> DomainResult<Fee> {
    fees::table
        .filter(fees::course_id.eq(course_id))
        .filter(fees::semester.eq(semester))
        .first::<Fee>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("no fee structure found for this course and semester"))
}

fn has_unpaid(conn: &mut PgConnection, student_id: Uuid, fee_id: Uuid) -> QueryResult<bool> {
    select(exists(
        invoices::table
            .filter(invoices::student_id.eq(student_id))
            .filter(invoices::fee_id.eq(fee_id))
            .filter(invoices::status.eq(STATUS_UNPAID)),
    ))
    .get_result(conn)
}

fn next_sequence(conn: &mut PgConnection, prefix: &str) -> QueryResult<i64> {
    let issued: Vec<String> = invoices::table
        .filter(invoices::invoice_no.like(format!("{prefix}%")))
        .select(invoices::invoice_no)
        .load(conn)?;
    Ok(highest_sequence(prefix, issued.iter().map(String::as_str)) + 1)
}

/// Allocates the next `INV-YYYYMMDD-NNNN` number and inserts the invoice.
/// Each attempt runs in a savepoint so a number collision can be retried.
fn insert_invoice(
    conn: &mut PgConnection,
    student_id: Uuid,
    fee: &Fee,
    due_date: Option<NaiveDate>,
) -> DomainResult<Invoice> {
    let prefix = invoice_prefix(Utc::now().date_naive());
    let mut seq = next_sequence(conn, &prefix)?;
    for _ in 0..MAX_INVOICE_NO_ATTEMPTS {
        let row = NewInvoice {
            id: Uuid::new_v4(),
            invoice_no: format_invoice_no(&prefix, seq),
            student_id,
            fee_id: fee.id,
            amount_due_cents: fee.amount_cents,
            due_date,
            status: STATUS_UNPAID.to_string(),
        };
        let attempt = conn.transaction::<Invoice, diesel::result::Error, _>(|conn| {
            diesel::insert_into(invoices::table)
                .values(&row)
                .get_result::<Invoice>(conn)
        });
        match attempt {
            Ok(invoice) => return Ok(invoice),
            Err(err) if is_unique_violation(&err, Some(INVOICE_NO_KEY)) => {
                seq = next_sequence(conn, &prefix)?.max(seq + 1);
            }
            Err(err) if is_unique_violation(&err, Some(ONE_UNPAID_INDEX)) => {
                return Err(DomainError::conflict(
                    "an unpaid invoice already exists for this student",
                ))
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(DomainError::conflict("could not allocate an invoice number"))
}

fn invoice_message(invoice: &Invoice, currency: &str) -> String {
    let due = invoice
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "Invoice {} for {} {} has been generated. Due by: {}",
        invoice.invoice_no,
        currency,
        format_cents(invoice.amount_due_cents),
        due
    )
}

fn notify_invoiced(conn: &mut PgConnection, invoices_created: &[Invoice]) {
    if invoices_created.is_empty() {
        return;
    }
    let student_ids: Vec<Uuid> = invoices_created.iter().map(|i| i.student_id).collect();
    let user_by_student: HashMap<Uuid, Uuid> = notify::best_effort_recipients(
        students::table
            .filter(students::id.eq_any(&student_ids))
            .select((students::id, students::user_id))
            .load::<(Uuid, Uuid)>(conn),
        "invoice",
    )
    .into_iter()
    .collect();

    let currency = currency(conn);
    for invoice in invoices_created {
        if let Some(user_id) = user_by_student.get(&invoice.student_id) {
            notify::notify(conn, *user_id, &invoice_message(invoice, &currency));
        }
    }
}

pub fn generate_invoice(
    conn: &mut PgConnection,
    student_id: Uuid,
    due_date: Option<NaiveDate>,
) -> DomainResult<Invoice> {
    let student = load_student(conn, student_id)?;
    let (course_id, semester) = match (student.course_id, student.semester.as_deref()) {
        (Some(course_id), Some(semester)) if !semester.trim().is_empty() => {
            (course_id, semester.to_string())
        }
        _ => {
            return Err(DomainError::invalid_state(
                "student must have a course and semester set",
            ))
        }
    };
    let fee = fee_for(conn, course_id, &semester)?;

    let invoice = conn.transaction::<_, DomainError, _>(|conn| {
        if has_unpaid(conn, student_id, fee.id)? {
            return Err(DomainError::conflict(
                "an unpaid invoice already exists for this student",
            ));
        }
        insert_invoice(conn, student_id, &fee, due_date)
    })?;

    info!(invoice_no = %invoice.invoice_no, %student_id, "invoice generated");
    notify_invoiced(conn, std::slice::from_ref(&invoice));
    Ok(invoice)
}

/// One invoice per student of the (course, semester), all in one transaction.
/// Students already holding an unpaid invoice for the fee are skipped.
pub fn generate_bulk(
    conn: &mut PgConnection,
    course_id: Uuid,
    semester: &str,
    due_date: Option<NaiveDate>,
) -> DomainResult<BulkInvoiceOutcome> {
    let semester = validate_semester(semester)?;
    let fee = fee_for(conn, course_id, &semester)?;

    let student_ids: Vec<Uuid> = students::table
        .filter(students::course_id.eq(course_id))
        .filter(students::semester.eq(&semester))
        .select(students::id)
        .order(students::roll_number.asc())
        .load(conn)?;
    if student_ids.is_empty() {
        return Err(DomainError::not_found(
            "no students found for that course and semester",
        ));
    }

    let (created, skipped) = conn.transaction::<_, DomainError, _>(|conn| {
        let mut created = Vec::new();
        let mut skipped = 0;
        for student_id in &student_ids {
            if has_unpaid(conn, *student_id, fee.id)? {
                skipped += 1;
                continue;
            }
            created.push(insert_invoice(conn, *student_id, &fee, due_date)?);
        }
        Ok((created, skipped))
    })?;

    info!(%course_id, %semester, created = created.len(), skipped, "bulk invoices generated");
    notify_invoiced(conn, &created);

    Ok(BulkInvoiceOutcome {
        created: created.len(),
        skipped,
    })
}

/// Records the payment and flips the invoice to paid in one transaction.
pub fn pay_invoice(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    student_id: Uuid,
) -> DomainResult<Payment> {
    let payment = conn.transaction::<_, DomainError, _>(|conn| {
        let invoice = invoices::table
            .filter(invoices::id.eq(invoice_id))
            .filter(invoices::student_id.eq(student_id))
            .first::<Invoice>(conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("invoice not found"))?;

        let flipped = diesel::update(
            invoices::table
                .filter(invoices::id.eq(invoice_id))
                .filter(invoices::status.eq(STATUS_UNPAID)),
        )
        .set(invoices::status.eq(STATUS_PAID))
        .execute(conn)?;
        if flipped == 0 {
            return Err(DomainError::conflict("invoice is not awaiting payment"));
        }

        Ok(diesel::insert_into(payments::table)
            .values(&NewPayment {
                id: Uuid::new_v4(),
                invoice_id,
                student_id,
                fee_id: invoice.fee_id,
                amount_cents: invoice.amount_due_cents,
                status: STATUS_PAID.to_string(),
                payment_date: Utc::now().date_naive(),
            })
            .get_result::<Payment>(conn)?)
    })?;

    info!(%invoice_id, %student_id, "invoice paid");
    Ok(payment)
}

pub fn invoices_for_student(conn: &mut PgConnection, student_id: Uuid) -> QueryResult<Vec<Invoice>> {
    invoices::table
        .filter(invoices::student_id.eq(student_id))
        .order(invoices::created_at.desc())
        .load(conn)
}

pub fn list_invoices(conn: &mut PgConnection, status: Option<&str>) -> DomainResult<Vec<Invoice>> {
    let mut query = invoices::table.into_boxed();
    if let Some(status) = status {
        if !INVOICE_STATUSES.contains(&status) {
            return Err(DomainError::invalid_input(format!(
                "unknown invoice status {status}"
            )));
        }
        query = query.filter(invoices::status.eq(status.to_string()));
    }
    Ok(query.order(invoices::created_at.desc()).load(conn)?)
}

pub fn delete_invoice(conn: &mut PgConnection, invoice_id: Uuid) -> DomainResult<()> {
    let deleted = diesel::delete(invoices::table.find(invoice_id)).execute(conn)?;
    if deleted == 0 {
        return Err(DomainError::not_found("invoice not found"));
    }
    Ok(())
}
