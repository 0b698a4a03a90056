// Configuration file loader

use super::{Config, ConfigError, Result};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(FileFormat::Yaml),
            "json" => Some(FileFormat::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }

    pub fn parse(&self, content: &str) -> std::result::Result<Value, String> {
        match self {
            FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Loads the configuration document for the active environment.
///
/// With the defaults, `APP_ENV=prod` makes the loader try
/// `application.prod.yaml`, `application.prod.yml` and `application.prod.json`
/// in the working directory before falling back to `application.yaml`,
/// `application.yml` and `application.json`.
///
/// # Example
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .base_name("settings")
///     .env_var("SETTINGS_ENV")
///     .load()?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    dir: PathBuf,
    base_name: String,
    env_var: String,
    environment: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            base_name: "application".to_string(),
            env_var: "APP_ENV".to_string(),
            environment: None,
        }
    }

    /// Directory the file names are resolved against.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = name.into();
        self
    }

    /// Environment variable naming the active environment.
    pub fn env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Force an environment instead of reading the environment variable.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn active_environment(&self) -> Option<String> {
        self.environment
            .clone()
            .or_else(|| env::var(&self.env_var).ok())
            .map(|env| env.trim().to_string())
            .filter(|env| !env.is_empty())
    }

    /// Candidate files, most specific first.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut names = Vec::new();
        if let Some(environment) = self.active_environment() {
            names.extend(
                EXTENSIONS
                    .iter()
                    .map(|ext| format!("{}.{}.{}", self.base_name, environment, ext)),
            );
        }
        names.extend(
            EXTENSIONS
                .iter()
                .map(|ext| format!("{}.{}", self.base_name, ext)),
        );
        names.into_iter().map(|name| self.dir.join(name)).collect()
    }

    pub fn load(&self) -> Result<Config> {
        let candidates = self.candidates();
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load_file(path)
            }
            None => Err(ConfigError::NotFound {
                dir: self.dir.clone(),
                tried: candidates
                    .iter()
                    .filter_map(|path| path.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root = format.parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(Config::new(root))
    }
}
