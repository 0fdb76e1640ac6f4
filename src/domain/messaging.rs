//! Internal messages between users.
//!
//! Students may write to faculty teaching one of their subjects, faculty to
//! students enrolled in one of theirs; admins may write to anyone.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use uuid::Uuid;

use super::{
    faculty_for_user, optional_text, required_text, student_for_user, DomainError, DomainResult,
};
use crate::auth::Role;
use crate::models::{Message, NewMessage};
use crate::schema::{enrollments, faculty, faculty_subject, messages, students, users};

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub user_id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MailboxEntry {
    pub id: Uuid,
    pub counterpart_user_id: Uuid,
    pub counterpart_email: String,
    pub subject: Option<String>,
    pub body: String,
    pub is_read: bool,
    pub created_at: chrono::NaiveDateTime,
}

fn student_contacts(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<Vec<Contact>> {
    let student = student_for_user(conn, user_id)?;
    let subject_ids: Vec<Uuid> = enrollments::table
        .filter(enrollments::student_id.eq(student.id))
        .select(enrollments::subject_id)
        .load(conn)?;

    let rows: Vec<(Uuid, String)> = faculty_subject::table
        .inner_join(faculty::table)
        .filter(faculty_subject::subject_id.eq_any(&subject_ids))
        .select((faculty::user_id, faculty::name))
        .distinct()
        .order(faculty::name.asc())
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(user_id, name)| Contact {
            user_id,
            name,
            role: Role::Faculty.to_string(),
        })
        .collect())
}

fn faculty_contacts(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<Vec<Contact>> {
    let member = faculty_for_user(conn, user_id)?;
    let subject_ids: Vec<Uuid> = faculty_subject::table
        .filter(faculty_subject::faculty_id.eq(member.id))
        .select(faculty_subject::subject_id)
        .load(conn)?;

    let rows: Vec<(Uuid, String)> = enrollments::table
        .inner_join(students::table)
        .filter(enrollments::subject_id.eq_any(&subject_ids))
        .select((students::user_id, students::name))
        .distinct()
        .order(students::name.asc())
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(user_id, name)| Contact {
            user_id,
            name,
            role: Role::Student.to_string(),
        })
        .collect())
}

fn everyone_but(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<Vec<Contact>> {
    let rows: Vec<(Uuid, String, String)> = users::table
        .filter(users::id.ne(user_id))
        .filter(users::is_active.eq(true))
        .select((users::id, users::email, users::role))
        .order(users::email.asc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(user_id, name, role)| Contact {
            user_id,
            name,
            role,
        })
        .collect())
}

/// Users the sender is allowed to write to.
pub fn contacts(conn: &mut PgConnection, user_id: Uuid, role: Role) -> DomainResult<Vec<Contact>> {
    match role {
        Role::Student => student_contacts(conn, user_id),
        Role::Faculty => faculty_contacts(conn, user_id),
        Role::Admin => everyone_but(conn, user_id),
    }
}

pub fn send_message(
    conn: &mut PgConnection,
    sender_user_id: Uuid,
    sender_role: Role,
    receiver_user_id: Uuid,
    subject: Option<&str>,
    body: &str,
) -> DomainResult<Message> {
    let body = required_text(body, "message body", 10_000)?;
    let subject = optional_text(subject);
    if subject.as_deref().is_some_and(|s| s.chars().count() > 200) {
        return Err(DomainError::invalid_input("subject must be at most 200 characters"));
    }
    if receiver_user_id == sender_user_id {
        return Err(DomainError::invalid_input("cannot send a message to yourself"));
    }

    let receiver_exists: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::id.eq(receiver_user_id)),
    ))
    .get_result(conn)?;
    if !receiver_exists {
        return Err(DomainError::not_found("recipient not found"));
    }

    let allowed = contacts(conn, sender_user_id, sender_role)?
        .iter()
        .any(|contact| contact.user_id == receiver_user_id);
    if !allowed {
        return Err(DomainError::forbidden("not allowed to message this user"));
    }

    Ok(diesel::insert_into(messages::table)
        .values(&NewMessage {
            id: Uuid::new_v4(),
            sender_user_id,
            receiver_user_id,
            subject,
            body,
        })
        .get_result::<Message>(conn)?)
}

pub fn inbox(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<MailboxEntry>> {
    let rows: Vec<(Message, String)> = messages::table
        .inner_join(users::table.on(users::id.eq(messages::sender_user_id)))
        .filter(messages::receiver_user_id.eq(user_id))
        .select((messages::all_columns, users::email))
        .order(messages::created_at.desc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(message, email)| mailbox_entry(message.sender_user_id, email, message))
        .collect())
}

pub fn sent(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<MailboxEntry>> {
    let rows: Vec<(Message, String)> = messages::table
        .inner_join(users::table.on(users::id.eq(messages::receiver_user_id)))
        .filter(messages::sender_user_id.eq(user_id))
        .select((messages::all_columns, users::email))
        .order(messages::created_at.desc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(message, email)| mailbox_entry(message.receiver_user_id, email, message))
        .collect())
}

fn mailbox_entry(counterpart_user_id: Uuid, counterpart_email: String, message: Message) -> MailboxEntry {
    MailboxEntry {
        id: message.id,
        counterpart_user_id,
        counterpart_email,
        subject: message.subject,
        body: message.body,
        is_read: message.is_read,
        created_at: message.created_at,
    }
}

/// Opens a message; only its receiver can, and doing so marks it read.
pub fn read_message(conn: &mut PgConnection, user_id: Uuid, message_id: Uuid) -> DomainResult<Message> {
    let message = messages::table
        .filter(messages::id.eq(message_id))
        .filter(messages::receiver_user_id.eq(user_id))
        .first::<Message>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("message not found"))?;

    if message.is_read {
        return Ok(message);
    }
    Ok(diesel::update(messages::table.find(message_id))
        .set((
            messages::is_read.eq(true),
            messages::read_at.eq(Some(Utc::now().naive_utc())),
        ))
        .get_result::<Message>(conn)?)
}

pub fn list_all(conn: &mut PgConnection, limit: i64) -> QueryResult<Vec<Message>> {
    messages::table
        .order(messages::created_at.desc())
        .limit(limit)
        .load(conn)
}
