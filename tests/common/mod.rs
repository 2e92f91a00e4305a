#![allow(dead_code)]

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use recipe_backend::{
    actions::register_user,
    form::NewUser,
    schema::User,
};
use sqlx::{postgres::PgPoolOptions, PgPool};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Migrated pool for `DATABASE_URL`, or `None` when no database is configured.
pub async fn database() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("database should be reachable");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations should apply");

    Some(pool)
}

/// An email no other test run has used.
pub fn unique_email(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}-{nanos}-{n}@example.com")
}

pub async fn user(pool: &PgPool, prefix: &str) -> User {
    let mut conn = pool.acquire().await.unwrap();
    register_user(
        &mut conn,
        NewUser {
            email: unique_email(prefix),
            password: "testpass123".to_string(),
            name: "Test Name".to_string(),
        },
    )
    .await
    .unwrap()
}
