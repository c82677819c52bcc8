// src/config.rs

use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the service on in-memory storage.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::InternalServerError("JWT_SECRET must be set".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 5)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        Ok(Self {
            database_url,
            db_max_connections,
            jwt_secret,
            rust_log,
            bind_addr,
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
