// src/config.rs

use crate::constants::*;
use crate::error::{MasteryError, MasteryResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "speed_mastery.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub course_id: String,
    pub log_filter: String,
    pub upi_vpa: String,
    pub upi_payee: String,
    pub premium_price_inr: i64,
    /// Users granted the admin role when they sign in.
    pub admin_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from(DATABASE_FILE_NAME),
            course_id: DEFAULT_COURSE_ID.to_string(),
            log_filter: "info".to_string(),
            upi_vpa: DEFAULT_UPI_VPA.to_string(),
            upi_payee: DEFAULT_UPI_PAYEE.to_string(),
            premium_price_inr: PREMIUM_PRICE_INR,
            admin_ids: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `config.json` in `data_dir` if present, then env overrides.
    /// A relative database path is resolved against `data_dir`.
    pub fn load(data_dir: &Path) -> MasteryResult<Self> {
        let file = data_dir.join(CONFIG_FILE_NAME);
        let mut config = if file.exists() {
            let raw = fs::read_to_string(&file)
                .map_err(|e| MasteryError::Config(format!("{}: {}", file.display(), e)))?;
            serde_json::from_str::<AppConfig>(&raw)
                .map_err(|e| MasteryError::Config(format!("{}: {}", file.display(), e)))?
        } else {
            debug!("No config file at {:?}, using defaults", file);
            AppConfig::default()
        };

        config.apply_env(|key| std::env::var(key).ok());

        if config.database_path.is_relative() {
            config.database_path = data_dir.join(&config.database_path);
        }
        if config.premium_price_inr <= 0 {
            return Err(MasteryError::Config(
                "premium_price_inr must be positive".to_string(),
            ));
        }
        info!("Config loaded (database: {:?})", config.database_path);
        Ok(config)
    }

    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(path) = lookup("MASTERY_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(filter) = lookup("MASTERY_LOG") {
            self.log_filter = filter;
        }
        if let Some(vpa) = lookup("MASTERY_UPI_VPA") {
            self.upi_vpa = vpa;
        }
        if let Some(admins) = lookup("MASTERY_ADMINS") {
            self.admin_ids = admins
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_ids.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.course_id, DEFAULT_COURSE_ID);
        assert_eq!(config.database_path, dir.path().join(DATABASE_FILE_NAME));
        assert_eq!(config.premium_price_inr, PREMIUM_PRICE_INR);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"upi_vpa": "coach@okbank", "premium_price_inr": 299, "admin_ids": ["coach"]}"#,
        )
        .unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.upi_vpa, "coach@okbank");
        assert_eq!(config.premium_price_inr, 299);
        assert_eq!(config.upi_payee, DEFAULT_UPI_PAYEE);
        assert!(config.is_admin("coach"));
        assert!(!config.is_admin("riya"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(dir.path()),
            Err(MasteryError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("MASTERY_LOG", "debug"),
            ("MASTERY_DB_PATH", "/tmp/x.db"),
            ("MASTERY_ADMINS", "coach, ops ,"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.upi_vpa, DEFAULT_UPI_VPA);
        assert_eq!(config.admin_ids, vec!["coach", "ops"]);
    }
}
