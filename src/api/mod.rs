mod handlers;
mod reply;
mod routes;

use sqlx::{pool::PoolConnection, PgPool, Postgres};

use crate::{
    error::{Error, QueryError},
    jwt::SessionKeys,
};

pub use reply::handle_rejection;
pub use routes::{api, routes};

/// Shared by every request: the pool and the session signing key.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub keys: SessionKeys,
}

impl AppState {
    pub fn new(pool: PgPool, keys: SessionKeys) -> Self {
        Self { pool, keys }
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, Error> {
        Ok(self.pool.acquire().await.map_err(QueryError::from)?)
    }
}
