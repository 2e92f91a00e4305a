use sqlx::PgPool;
use warp::{reject::Rejection, Filter};

use crate::{
    actions::get_user_by_id,
    constants::SESSION_COOKIE,
    error::{Error, ErrorKind, QueryError},
};

use super::jwt::{SessionData, SessionKeys};

/// Resolves the caller from `Authorization: Bearer <token>` (or `Token <token>`),
/// falling back to the session cookie. Rejects with `Unauthenticated` before any
/// handler runs.
pub fn with_session(
    pool: PgPool,
    keys: SessionKeys,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .and(warp::any().map(move || pool.clone()))
        .and(warp::any().map(move || keys.clone()))
        .and_then(authenticate)
}

async fn authenticate(
    header: Option<String>,
    cookie: Option<String>,
    pool: PgPool,
    keys: SessionKeys,
) -> Result<SessionData, Rejection> {
    let token = header
        .as_deref()
        .and_then(bearer_token)
        .or(cookie)
        .ok_or_else(|| {
            ErrorKind::Unauthenticated.new("Authentication credentials were not provided.")
        })?;

    Ok(resolve_session(&pool, &keys, &token).await?)
}

async fn resolve_session(
    pool: &PgPool,
    keys: &SessionKeys,
    token: &str,
) -> Result<SessionData, Error> {
    let claims = keys.verify_jwt_session(token).map_err(|e| {
        log::debug!("Rejected session token: {e}");
        e
    })?;

    let mut conn = pool.acquire().await.map_err(QueryError::from)?;
    match get_user_by_id(&mut conn, claims.user_id).await? {
        Some(user) if user.is_active => Ok(SessionData::from(&user)),
        _ => {
            log::debug!("Session of missing or inactive user {}", claims.user_id);
            Err(ErrorKind::Unauthenticated.new("User inactive or deleted."))
        }
    }
}

/// Token part of an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty()
        || !(scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token"))
    {
        return None;
    }
    Some(token.to_string())
}
