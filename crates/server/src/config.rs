use std::env;

use review_engine::config::ReviewConfig;
use review_engine::error::ReviewError;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub review: ReviewConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ReviewError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            review: ReviewConfig::from_env()?,
        })
    }
}
