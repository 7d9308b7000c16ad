use anyhow::{Context, Result};

/// Process configuration, read from the environment exactly once at startup.
/// Components receive what they need from here instead of reaching for
/// `std::env` themselves.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
        })
    }
}
