//! Runtime settings read from the environment

use anyhow::{Context, anyhow};
use std::env;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEFAULT_NOTIFICATION_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub allowed_origins: Vec<String>,
    pub notification_queue_capacity: usize,
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned());

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_owned())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect();

        let notification_queue_capacity = match lookup("NOTIFICATION_QUEUE_CAPACITY") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("NOTIFICATION_QUEUE_CAPACITY `{value}` is not a number"))?,
            None => DEFAULT_NOTIFICATION_QUEUE_CAPACITY,
        };
        if notification_queue_capacity == 0 {
            return Err(anyhow!("NOTIFICATION_QUEUE_CAPACITY must be positive"));
        }

        Ok(Settings {
            database_url,
            bind_address,
            allowed_origins,
            notification_queue_capacity,
        })
    }
}
