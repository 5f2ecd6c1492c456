use crate::error::AppError;
use serde::Deserialize;
use std::collections::HashSet;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};

/// Extensions scanned when nothing else is configured, lowercase and without the dot.
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub allowed_extensions: HashSet<String>,
    pub log_level: String,
    pub hash_chunk_size: usize,
    pub show_progress: bool,
    pub show_summary: bool,
}

impl AppConfig {
    pub fn new() -> Result<Self, AppError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("IMAGE_CENSUS")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_extensions"),
            )
            .build()?;

        Self::finish(s.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("allowed_extensions", DEFAULT_EXTENSIONS.to_vec())?
            .set_default("log_level", "info")?
            .set_default("hash_chunk_size", 64_i64 * 1024)?
            .set_default("show_progress", true)?
            .set_default("show_summary", true)
    }

    /// Normalizes extensions to the form the walker compares against and rejects
    /// settings the extractor cannot work with.
    fn finish(mut config: AppConfig) -> Result<Self, AppError> {
        if config.hash_chunk_size == 0 {
            return Err(AppError::Config(ConfigError::Message(
                "hash_chunk_size must be at least 1 byte".to_string(),
            )));
        }
        config.allowed_extensions = config
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            log_level: "info".to_string(),
            hash_chunk_size: 64 * 1024,
            show_progress: true,
            show_summary: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_match_default_impl() {
        let built = AppConfig::defaults().unwrap().build().unwrap();
        let config = AppConfig::finish(built.try_deserialize().unwrap()).unwrap();
        let fallback = AppConfig::default();

        assert_eq!(config.allowed_extensions, fallback.allowed_extensions);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.hash_chunk_size, 65536);
        assert!(config.show_progress);
        assert!(config.show_summary);
    }

    #[test]
    fn extensions_are_normalized() {
        let mut config = AppConfig::default();
        config.allowed_extensions = [".JPG", " Png ", ""].iter().map(|s| s.to_string()).collect();

        let config = AppConfig::finish(config).unwrap();
        let expected: HashSet<String> = ["jpg", "png"].iter().map(|s| s.to_string()).collect();
        assert_eq!(config.allowed_extensions, expected);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = AppConfig::default();
        config.hash_chunk_size = 0;
        assert!(matches!(AppConfig::finish(config), Err(AppError::Config(_))));
    }

    #[test]
    fn later_sources_override_defaults() {
        let built = AppConfig::defaults()
            .unwrap()
            .set_override("log_level", "debug")
            .unwrap()
            .set_override("show_summary", false)
            .unwrap()
            .build()
            .unwrap();
        let config: AppConfig = built.try_deserialize().unwrap();

        assert_eq!(config.log_level, "debug");
        assert!(!config.show_summary);
        assert!(config.show_progress);
    }
}
