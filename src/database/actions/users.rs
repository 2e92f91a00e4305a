use sqlx::PgConnection;

use crate::{
    authentication::cryptography::{hash_password, verify_password},
    error::{Error, ErrorKind, FieldErrors, QueryError},
    form::{NewUser, UserChanges},
    schema::{User, Uuid},
};

const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

pub async fn get_user(conn: &mut PgConnection, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates an account with a hashed password. A taken email is an input error.
pub async fn register_user(conn: &mut PgConnection, user: NewUser) -> Result<User, Error> {
    let password = hash_password(&user.password)?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, password, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(password)
    .bind(&user.name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    match row {
        Some(row) => {
            log::info!("Registered user {}", row.id);
            Ok(row)
        }
        None => Err(email_taken()),
    }
}

/// Checks credentials of an active account.
pub async fn authenticate_user(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
) -> Result<User, Error> {
    let Some(user) = get_user(&mut *conn, email).await? else {
        log::debug!("Login attempt for unknown email");
        return Err(ErrorKind::InvalidInput.new(INVALID_CREDENTIALS));
    };

    if !user.is_active || !verify_password(password, &user.password)? {
        log::debug!("Rejected login for user {}", user.id);
        return Err(ErrorKind::InvalidInput.new(INVALID_CREDENTIALS));
    }

    Ok(user)
}

pub async fn update_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    changes: UserChanges,
) -> Result<User, Error> {
    let current = get_user_by_id(&mut *conn, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user"))?;

    let password = match changes.password {
        Some(password) => hash_password(&password)?,
        None => current.password,
    };

    let row: User = sqlx::query_as(
        "UPDATE users SET email = $1, password = $2, name = $3 WHERE id = $4 RETURNING *",
    )
    .bind(changes.email.unwrap_or(current.email))
    .bind(password)
    .bind(changes.name.unwrap_or(current.name))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => email_taken(),
        _ => QueryError::from(e).into(),
    })?;

    log::debug!("Updated profile of user {user_id}");
    Ok(row)
}

fn email_taken() -> Error {
    let mut fields = FieldErrors::new();
    fields.insert(
        "email".to_string(),
        vec!["user with this email already exists.".to_string()],
    );
    Error::invalid_fields(fields)
}
