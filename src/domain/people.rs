//! Student and faculty profiles together with their login accounts.

use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::PgConnection;
use uuid::Uuid;

use super::{
    is_unique_violation, optional_text, required_email, required_text, validate_semester,
    DomainError, DomainResult,
};
use crate::auth::{password::MIN_PASSWORD_LEN, session, Role};
use crate::models::{Faculty, NewFaculty, NewStudent, NewUser, Student, User};
use crate::schema::{courses, faculty, students, users};

#[derive(Debug, Clone)]
pub struct StudentInput {
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub phone: Option<String>,
    pub course_id: Uuid,
    pub semester: String,
}

#[derive(Debug, Clone)]
pub struct FacultyInput {
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = students)]
struct StudentChangeset {
    name: String,
    roll_number: String,
    email: String,
    phone: Option<String>,
    course_id: Option<Uuid>,
    semester: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = faculty)]
struct FacultyChangeset {
    name: String,
    email: String,
    department: Option<String>,
    phone: Option<String>,
}

struct CleanStudent {
    name: String,
    roll_number: String,
    email: String,
    phone: Option<String>,
    course_id: Uuid,
    semester: String,
}

fn clean_student(conn: &mut PgConnection, input: &StudentInput) -> DomainResult<CleanStudent> {
    let cleaned = CleanStudent {
        name: required_text(&input.name, "name", 100)?,
        roll_number: required_text(&input.roll_number, "roll number", 50)?,
        email: required_email(&input.email)?,
        phone: optional_text(input.phone.as_deref()),
        course_id: input.course_id,
        semester: validate_semester(&input.semester)?,
    };
    let course_exists: bool = diesel::select(diesel::dsl::exists(
        courses::table.filter(courses::id.eq(cleaned.course_id)),
    ))
    .get_result(conn)?;
    if !course_exists {
        return Err(DomainError::not_found("course not found"));
    }
    Ok(cleaned)
}

fn map_identity_conflict(err: DieselError) -> DomainError {
    if is_unique_violation(&err, Some("users_email_key")) {
        DomainError::conflict("email already in use")
    } else if is_unique_violation(&err, Some("students_roll_number_key")) {
        DomainError::conflict("roll number already in use")
    } else {
        DomainError::Database(err)
    }
}

fn insert_user(
    conn: &mut PgConnection,
    email: &str,
    password_hash: &str,
    role: Role,
) -> DomainResult<Uuid> {
    let user = NewUser {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role: role.as_str().to_string(),
        is_active: true,
        session_token: Uuid::new_v4(),
    };
    diesel::insert_into(users::table)
        .values(&user)
        .execute(conn)
        .map_err(map_identity_conflict)?;
    Ok(user.id)
}

/// Creates the login account and the student profile in one transaction.
pub fn create_student(
    conn: &mut PgConnection,
    input: &StudentInput,
    password_hash: &str,
) -> DomainResult<Student> {
    let cleaned = clean_student(conn, input)?;
    conn.transaction::<_, DomainError, _>(|conn| {
        let user_id = insert_user(conn, &cleaned.email, password_hash, Role::Student)?;
        let row = NewStudent {
            id: Uuid::new_v4(),
            user_id,
            name: cleaned.name,
            roll_number: cleaned.roll_number,
            email: cleaned.email,
            phone: cleaned.phone,
            course_id: Some(cleaned.course_id),
            semester: Some(cleaned.semester),
        };
        diesel::insert_into(students::table)
            .values(&row)
            .get_result::<Student>(conn)
            .map_err(map_identity_conflict)
    })
}

pub fn update_student(
    conn: &mut PgConnection,
    student_id: Uuid,
    input: &StudentInput,
    is_active: bool,
) -> DomainResult<Student> {
    let cleaned = clean_student(conn, input)?;
    conn.transaction::<_, DomainError, _>(|conn| {
        let existing = students::table
            .find(student_id)
            .first::<Student>(conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("student not found"))?;

        update_account(conn, existing.user_id, &cleaned.email, is_active)?;

        diesel::update(students::table.find(student_id))
            .set(&StudentChangeset {
                name: cleaned.name,
                roll_number: cleaned.roll_number,
                email: cleaned.email,
                phone: cleaned.phone,
                course_id: Some(cleaned.course_id),
                semester: Some(cleaned.semester),
            })
            .get_result::<Student>(conn)
            .map_err(map_identity_conflict)
    })
}

/// Deletes the profile and its login account together.
pub fn delete_student(conn: &mut PgConnection, student_id: Uuid) -> DomainResult<Student> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let existing = students::table
            .find(student_id)
            .first::<Student>(conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("student not found"))?;
        diesel::delete(students::table.find(student_id)).execute(conn)?;
        diesel::delete(users::table.find(existing.user_id)).execute(conn)?;
        Ok(existing)
    })
}

pub fn list_students(
    conn: &mut PgConnection,
    course_id: Option<Uuid>,
    semester: Option<&str>,
) -> QueryResult<Vec<(Student, bool)>> {
    let mut query = students::table
        .inner_join(users::table)
        .select((students::all_columns, users::is_active))
        .into_boxed();
    if let Some(course_id) = course_id {
        query = query.filter(students::course_id.eq(course_id));
    }
    if let Some(semester) = semester {
        query = query.filter(students::semester.eq(semester.to_string()));
    }
    query.order(students::roll_number.asc()).load(conn)
}

pub fn create_faculty(
    conn: &mut PgConnection,
    input: &FacultyInput,
    password_hash: &str,
) -> DomainResult<Faculty> {
    let name = required_text(&input.name, "name", 100)?;
    let email = required_email(&input.email)?;
    conn.transaction::<_, DomainError, _>(|conn| {
        let user_id = insert_user(conn, &email, password_hash, Role::Faculty)?;
        let row = NewFaculty {
            id: Uuid::new_v4(),
            user_id,
            name,
            email,
            department: optional_text(input.department.as_deref()),
            phone: optional_text(input.phone.as_deref()),
        };
        Ok(diesel::insert_into(faculty::table)
            .values(&row)
            .get_result::<Faculty>(conn)?)
    })
}

pub fn update_faculty(
    conn: &mut PgConnection,
    faculty_id: Uuid,
    input: &FacultyInput,
    is_active: bool,
) -> DomainResult<Faculty> {
    let name = required_text(&input.name, "name", 100)?;
    let email = required_email(&input.email)?;
    conn.transaction::<_, DomainError, _>(|conn| {
        let existing = faculty::table
            .find(faculty_id)
            .first::<Faculty>(conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("faculty member not found"))?;

        update_account(conn, existing.user_id, &email, is_active)?;

        Ok(diesel::update(faculty::table.find(faculty_id))
            .set(&FacultyChangeset {
                name,
                email,
                department: optional_text(input.department.as_deref()),
                phone: optional_text(input.phone.as_deref()),
            })
            .get_result::<Faculty>(conn)?)
    })
}

pub fn delete_faculty(conn: &mut PgConnection, faculty_id: Uuid) -> DomainResult<Faculty> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let existing = faculty::table
            .find(faculty_id)
            .first::<Faculty>(conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("faculty member not found"))?;
        diesel::delete(faculty::table.find(faculty_id)).execute(conn)?;
        diesel::delete(users::table.find(existing.user_id)).execute(conn)?;
        Ok(existing)
    })
}

pub fn list_faculty(conn: &mut PgConnection) -> QueryResult<Vec<(Faculty, bool)>> {
    faculty::table
        .inner_join(users::table)
        .select((faculty::all_columns, users::is_active))
        .order(faculty::name.asc())
        .load(conn)
}

fn update_account(
    conn: &mut PgConnection,
    user_id: Uuid,
    email: &str,
    is_active: bool,
) -> DomainResult<()> {
    diesel::update(users::table.find(user_id))
        .set((users::email.eq(email), users::is_active.eq(is_active)))
        .execute(conn)
        .map_err(map_identity_conflict)?;
    if !is_active {
        rotate_session_token(conn, user_id)?;
    }
    Ok(())
}

/// Toggles `is_active`; deactivation also invalidates every open session.
pub fn set_active(conn: &mut PgConnection, user_id: Uuid, is_active: bool) -> DomainResult<()> {
    let updated = diesel::update(users::table.find(user_id))
        .set(users::is_active.eq(is_active))
        .execute(conn)?;
    if updated == 0 {
        return Err(DomainError::not_found("user not found"));
    }
    if !is_active {
        rotate_session_token(conn, user_id)?;
    }
    Ok(())
}

pub fn rotate_session_token(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<Uuid> {
    let token = Uuid::new_v4();
    let updated = diesel::update(users::table.find(user_id))
        .set(users::session_token.eq(token))
        .execute(conn)?;
    if updated == 0 {
        return Err(DomainError::not_found("user not found"));
    }
    Ok(token)
}

/// Stores a new hash and rotates the session token, logging the user out everywhere.
pub fn reset_password(
    conn: &mut PgConnection,
    user_id: Uuid,
    password_hash: &str,
) -> DomainResult<()> {
    let updated = diesel::update(users::table.find(user_id))
        .set((
            users::password_hash.eq(password_hash),
            users::session_token.eq(Uuid::new_v4()),
        ))
        .execute(conn)?;
    if updated == 0 {
        return Err(DomainError::not_found("user not found"));
    }
    Ok(())
}

pub fn validate_password_change(old: &str, new: &str, confirm: &str) -> DomainResult<()> {
    if old.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err(DomainError::invalid_input("all fields are required"));
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::invalid_input(format!(
            "new password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if new != confirm {
        return Err(DomainError::invalid_input("passwords do not match"));
    }
    Ok(())
}

/// Rotates the session token and carries the current session across the rotation.
pub fn apply_password_change(
    conn: &mut PgConnection,
    user_id: Uuid,
    current_session_id: Uuid,
    password_hash: &str,
) -> DomainResult<Uuid> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let token = Uuid::new_v4();
        let updated = diesel::update(users::table.find(user_id))
            .set((
                users::password_hash.eq(password_hash),
                users::session_token.eq(token),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(DomainError::not_found("user not found"));
        }
        session::adopt_token(conn, current_session_id, token)?;
        Ok(token)
    })
}

pub fn find_user_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .first::<User>(conn)
        .optional()
}

pub fn find_user(conn: &mut PgConnection, user_id: Uuid) -> DomainResult<User> {
    users::table
        .find(user_id)
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("user not found"))
}

/// Profile name for students and faculty, the email otherwise.
pub fn display_name(conn: &mut PgConnection, user: &User) -> QueryResult<String> {
    let name = match Role::parse(&user.role) {
        Some(Role::Student) => students::table
            .filter(students::user_id.eq(user.id))
            .select(students::name)
            .first::<String>(conn)
            .optional()?,
        Some(Role::Faculty) => faculty::table
            .filter(faculty::user_id.eq(user.id))
            .select(faculty::name)
            .first::<String>(conn)
            .optional()?,
        _ => None,
    };
    Ok(name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user.email.clone()))
}

pub fn create_admin(
    conn: &mut PgConnection,
    email: &str,
    password_hash: &str,
) -> DomainResult<Uuid> {
    let email = required_email(email)?;
    insert_user(conn, &email, password_hash, Role::Admin)
}
