use std::env;

use anyhow::{anyhow, Context, Result};

use campus::{
    auth::{password::hash_password, session},
    config::AppConfig,
    db::{self, PgPool},
    domain::people,
};

const USAGE: &str = "Usage: maintenance create-admin <email> <password> | purge-sessions";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("create-admin") => {
            let (Some(email), Some(password)) = (args.next(), args.next()) else {
                eprintln!("{USAGE}");
                std::process::exit(1);
            };
            create_admin(&email, &password)?
        }
        Some("purge-sessions") => purge_sessions()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(pool)
}

fn create_admin(email: &str, password: &str) -> Result<()> {
    if password.len() < campus::auth::password::MIN_PASSWORD_LEN {
        return Err(anyhow!(
            "password must be at least {} characters",
            campus::auth::password::MIN_PASSWORD_LEN
        ));
    }
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let hash = hash_password(password)?;
    let user_id = people::create_admin(&mut conn, email, &hash)
        .map_err(|err| anyhow!("failed to create admin: {err}"))?;

    println!("Created admin {email} ({user_id}).");
    Ok(())
}

fn purge_sessions() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let purged = session::purge_expired(&mut conn).context("failed to purge sessions")?;
    println!("Removed {purged} expired sessions.");
    Ok(())
}
