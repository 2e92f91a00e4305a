use std::io::Write;

use recipe_backend::{
    api::{api, AppState},
    config::Config,
    jwt::SessionKeys,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = dotenv::dotenv();
    let config = Config::load()?;

    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    if let Err(e) = env_file {
        log::trace!("> No .env file loaded: {e}");
    }
    for (key, default) in &config.defaults {
        log::info!("{key} not set, using default: {default}");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    log::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations applied");

    let keys = SessionKeys::new(config.jwt_secret.as_bytes(), config.session_lifetime_hours)?;

    log::info!("Listening on {}", config.bind_address);
    warp::serve(api(AppState::new(pool, keys)))
        .run(config.bind_address)
        .await;

    Ok(())
}
