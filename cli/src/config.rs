use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use mealsync_core::sync::{DuplicatePolicy, SyncOptions};

pub const DEFAULT_HOUSEHOLD: &str = "home";

pub struct Config {
    pub db_path: PathBuf,
    pub household_id: String,
    pub sync_options: SyncOptions,
}

impl Config {
    /// Data directory from the platform's project dirs, overridable through
    /// `MEALSYNC_DB`, `MEALSYNC_HOUSEHOLD` and `MEALSYNC_DUPLICATES`.
    pub fn load() -> Result<Self> {
        let db_path = match std::env::var_os("MEALSYNC_DB") {
            Some(path) => PathBuf::from(path),
            None => {
                let proj_dirs = ProjectDirs::from("", "", "mealsync")
                    .context("Could not determine home directory")?;
                let data_dir = proj_dirs.data_dir().to_path_buf();
                std::fs::create_dir_all(&data_dir).with_context(|| {
                    format!("Failed to create data directory: {}", data_dir.display())
                })?;
                data_dir.join("mealsync.db")
            }
        };

        let household_id = std::env::var("MEALSYNC_HOUSEHOLD")
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOUSEHOLD.to_string());

        let duplicate_policy = match std::env::var("MEALSYNC_DUPLICATES") {
            Ok(value) => value
                .parse::<DuplicatePolicy>()
                .context("Invalid MEALSYNC_DUPLICATES")?,
            Err(_) => DuplicatePolicy::default(),
        };

        log::debug!(
            "Using database {} for household '{household_id}' (duplicates: {duplicate_policy})",
            db_path.display()
        );

        Ok(Config {
            db_path,
            household_id,
            sync_options: SyncOptions { duplicate_policy },
        })
    }

    pub fn db_path_str(&self) -> Result<&str> {
        self.db_path
            .to_str()
            .with_context(|| format!("Database path is not valid UTF-8: {}", self.db_path.display()))
    }
}
