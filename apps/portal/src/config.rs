use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api/";
const DEFAULT_PAGE_SIZE: usize = 20;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base of the REST API, always with a trailing slash so endpoint joins
    /// stay relative to it.
    pub api_base: Url,
    /// Where the durable session (tokens + role) is persisted.
    pub session_file: PathBuf,
    /// Client-side page size for the interactive candidate list.
    pub page_size: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let mut api_base =
            std::env::var("PORTAL_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        let api_base: Url = api_base
            .parse()
            .context("PORTAL_API_BASE must be a valid URL")?;

        let session_file = std::env::var("PORTAL_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".portal-session.json"));

        let page_size = match std::env::var("PORTAL_PAGE_SIZE") {
            Ok(v) => v
                .parse::<usize>()
                .context("PORTAL_PAGE_SIZE must be a positive integer")?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        Ok(Config {
            api_base,
            session_file,
            page_size,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Backend origin (scheme://host:port/) used to absolutize relative
    /// resume paths.
    pub fn origin(&self) -> Url {
        let mut origin = self.api_base.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_the_api_path() {
        let config = Config {
            api_base: "http://127.0.0.1:8000/api/".parse().unwrap(),
            session_file: PathBuf::from(".portal-session.json"),
            page_size: 20,
            rust_log: "info".to_string(),
        };
        assert_eq!(config.origin().as_str(), "http://127.0.0.1:8000/");
    }
}
