use std::net::SocketAddr;

use anyhow::Context;
use jiff::SignedDuration;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub projection_window: SignedDuration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://marquee.db?mode=rwc".to_string());

        let db_max_connections: u32 =
            std::env::var("DB_MAX_CONNECTIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        let window_minutes: i64 = std::env::var("PROJECTION_WINDOW_MINUTES")
            .unwrap_or_else(|_| "180".to_string())
            .parse()
            .context("PROJECTION_WINDOW_MINUTES")?;
        if window_minutes <= 0 {
            anyhow::bail!("PROJECTION_WINDOW_MINUTES must be positive, got {window_minutes}");
        }

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            db_max_connections: db_max_connections.max(1),
            projection_window: SignedDuration::from_mins(window_minutes),
        })
    }
}
