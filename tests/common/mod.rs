use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{header::SET_COOKIE, Method, Request, StatusCode};
use axum::Router;
use campus::config::{AppConfig, DEFAULT_MAX_UPLOAD_BYTES};
use campus::db::{self, PgPool};
use campus::domain::{academics, enrollment, people};
use campus::routes;
use campus::state::AppState;
use campus::storage::{DiskStorage, MaterialStorage};
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const SEMESTER: &str = "S1";
pub const DEFAULT_PASSWORD: &str = "correct-horse";

/// Tables a test may fence off with a `CHECK ... NOT VALID` guard.
const GUARDABLE_TABLES: [&str; 3] = ["notifications", "audit_logs", "invoices"];
/// Tables a test may hide by renaming them to `<name>_offline`.
const HIDEABLE_TABLES: [&str; 1] = ["enrollments"];

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Profile id plus the login account behind it.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    materials_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;
        let materials_dir = tempfile::tempdir().context("failed to create materials dir")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            session_ttl_hours: 8,
            session_cookie_secure: false,
            session_cookie_domain: None,
            cors_allowed_origin: None,
            materials_dir: materials_dir.path().to_path_buf(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            auth_fail_open: false,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = DiskStorage::new(materials_dir.path())
            .await
            .map_err(|err| anyhow!("failed to open material storage: {err}"))?;
        let storage: Arc<dyn MaterialStorage> = Arc::new(storage);
        let state = AppState::new(pool, config, storage);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            materials_dir,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    /// New rows in `table` must satisfy `condition` until [`Self::lift_guard`].
    #[allow(dead_code)]
    pub async fn guard_inserts(&self, table: &'static str, condition: &str) -> Result<()> {
        ensure!(GUARDABLE_TABLES.contains(&table), "{table} cannot be guarded");
        let sql = format!(
            "ALTER TABLE {table} ADD CONSTRAINT {table}_guard CHECK ({condition}) NOT VALID;"
        );
        self.with_conn(move |conn| Ok(conn.batch_execute(&sql)?)).await
    }

    #[allow(dead_code)]
    pub async fn lift_guard(&self, table: &'static str) -> Result<()> {
        let sql = format!("ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {table}_guard;");
        self.with_conn(move |conn| Ok(conn.batch_execute(&sql)?)).await
    }

    #[allow(dead_code)]
    pub async fn hide_table(&self, table: &'static str) -> Result<()> {
        ensure!(HIDEABLE_TABLES.contains(&table), "{table} cannot be hidden");
        let sql = format!("ALTER TABLE {table} RENAME TO {table}_offline;");
        self.with_conn(move |conn| Ok(conn.batch_execute(&sql)?)).await
    }

    #[allow(dead_code)]
    pub async fn restore_table(&self, table: &'static str) -> Result<()> {
        let sql = format!("ALTER TABLE IF EXISTS {table}_offline RENAME TO {table};");
        self.with_conn(move |conn| Ok(conn.batch_execute(&sql)?)).await
    }

    #[allow(dead_code)]
    pub fn stored_file_count(&self) -> Result<usize> {
        Ok(std::fs::read_dir(self.materials_dir.path())?.count())
    }

    #[allow(dead_code)]
    pub async fn insert_admin(&self, email: &str, password: &str) -> Result<Uuid> {
        let email = email.to_string();
        let hash = hash_password(password)?;
        self.with_conn(move |conn| {
            people::create_admin(conn, &email, &hash).map_err(|err| anyhow!("{err}"))
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_course(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            academics::create_course(conn, &name, Some("3 years"))
                .map(|course| course.id)
                .map_err(|err| anyhow!("{err}"))
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_subject(&self, name: &str, course_id: Uuid, semester: &str) -> Result<Uuid> {
        let name = name.to_string();
        let semester = semester.to_string();
        self.with_conn(move |conn| {
            academics::create_subject(conn, &name, course_id, &semester)
                .map(|subject| subject.id)
                .map_err(|err| anyhow!("{err}"))
        })
        .await
    }

    /// Student login uses [`DEFAULT_PASSWORD`].
    #[allow(dead_code)]
    pub async fn insert_student(
        &self,
        name: &str,
        roll_number: &str,
        course_id: Uuid,
        semester: &str,
    ) -> Result<Account> {
        let input = people::StudentInput {
            name: name.to_string(),
            roll_number: roll_number.to_string(),
            email: format!("{}@students.test", roll_number.to_lowercase()),
            phone: None,
            course_id,
            semester: semester.to_string(),
        };
        let hash = hash_password(DEFAULT_PASSWORD)?;
        self.with_conn(move |conn| {
            let student =
                people::create_student(conn, &input, &hash).map_err(|err| anyhow!("{err}"))?;
            Ok(Account {
                id: student.id,
                user_id: student.user_id,
                email: student.email,
            })
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_faculty(&self, name: &str, email: &str) -> Result<Account> {
        let input = people::FacultyInput {
            name: name.to_string(),
            email: email.to_string(),
            department: Some("Sciences".to_string()),
            phone: None,
        };
        let hash = hash_password(DEFAULT_PASSWORD)?;
        self.with_conn(move |conn| {
            let member =
                people::create_faculty(conn, &input, &hash).map_err(|err| anyhow!("{err}"))?;
            Ok(Account {
                id: member.id,
                user_id: member.user_id,
                email: member.email,
            })
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn assign(&self, faculty_id: Uuid, subject_id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            academics::assign_subjects(conn, faculty_id, &[subject_id])
                .map(|_| ())
                .map_err(|err| anyhow!("{err}"))
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn enroll(&self, student_id: Uuid) -> Result<usize> {
        self.with_conn(move |conn| {
            enrollment::auto_enroll(conn, student_id)
                .map(|outcome| outcome.created)
                .map_err(|err| anyhow!("{err}"))
        })
        .await
    }

    /// Logs in and returns the `college_session=...` pair for the cookie header.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/login", &LoginPayload { email, password }, None)
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );
        session_cookie(&response).ok_or_else(|| anyhow!("login response set no session cookie"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        cookie: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, cookie).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        cookie: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, cookie).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        cookie: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, cookie: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(cookie) = cookie {
            builder.header("cookie", cookie)
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn upload_material(
        &self,
        filename: &str,
        data: &[u8],
        subject_id: Uuid,
        title: &str,
        cookie: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend(data);
        body.extend(b"\r\n");

        for (name, value) in [("subject_id", subject_id.to_string()), ("title", title.to_string())] {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/faculty/materials")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("cookie", cookie)
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("database task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn body_json(response: hyper::Response<Body>) -> Result<Value> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).context("response body is not JSON")
}

#[allow(dead_code)]
pub fn location(response: &hyper::Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
}

fn session_cookie(response: &hyper::Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with("college_session=") && pair.len() > "college_session=".len())
        .map(str::to_string)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        restore_tables(&mut conn)?;
        conn.run_pending_migrations(db::MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

/// Undoes guards and renames left behind by an aborted test.
fn restore_tables(conn: &mut PgConnection) -> Result<()> {
    for table in HIDEABLE_TABLES {
        conn.batch_execute(&format!(
            "ALTER TABLE IF EXISTS {table}_offline RENAME TO {table};"
        ))?;
    }
    for table in GUARDABLE_TABLES {
        conn.batch_execute(&format!(
            "ALTER TABLE IF EXISTS {table} DROP CONSTRAINT IF EXISTS {table}_guard;"
        ))?;
    }
    Ok(())
}

/// Leaves `system_settings` alone so the seeded defaults survive.
fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE payments, invoices, fees, marks, exams, attendance_details, attendance, \
         timetable, study_materials, messages, notifications, audit_logs, enrollments, \
         faculty_subject, students, faculty, subjects, courses, sessions, users \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    use argon2::password_hash::{PasswordHasher, SaltString};
    use argon2::Argon2;

    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string())
}
