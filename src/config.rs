use std::env;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb_uri: String,
    pub database: String,
    pub bind_addr: String,
    pub service_token: String,
    pub auth_secret: String,
}

impl Config {
    /// Reads configuration from the environment. `.env` is loaded by main
    /// before this runs.
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            mongodb_uri: require("MONGODB_URI")?,
            database: env::var("MONGODB_DATABASE").unwrap_or_else(|_| "splitledger".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            service_token: require("SERVICE_API_TOKEN")?,
            auth_secret: require("AUTH_SECRET")?,
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key).map_err(|_| Error::Config(format!("missing environment variable {key}")))
}
