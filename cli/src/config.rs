use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// The profile the terminal client works with when none is given.
pub const DEFAULT_USER_ID: i64 = 1;

pub struct Config {
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub server_url: String,
    pub user_id: i64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrisnap").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("nutrisnap.db");
        let upload_dir = data_dir.join("uploads");

        let server_url = std::env::var("NUTRISNAP_SERVER")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let user_id = match std::env::var("NUTRISNAP_USER_ID") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid NUTRISNAP_USER_ID '{raw}'"))?,
            Err(_) => DEFAULT_USER_ID,
        };

        Ok(Config {
            db_path,
            upload_dir,
            server_url,
            user_id,
        })
    }
}
