use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Could not determine a home directory for slipscan")]
    NoHome,
}

/// Everything the pipeline and its collaborators need, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlipConfig {
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract `tessdata` directory; `None` uses the engine's built-in search path.
    pub data_path: Option<PathBuf>,
    /// Language hint handed to the engine on every call.
    pub lang: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { data_path: None, lang: "eng+tha".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Median filter radius; 1 gives a 3×3 window, 0 disables denoising.
    pub median_radius: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { median_radius: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub intake_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::under(Path::new("."))
    }
}

impl StorageConfig {
    /// Standard layout rooted at `dir`.
    pub fn under(dir: &Path) -> Self {
        Self {
            uploads_dir: dir.join("uploads"),
            ledger_path: dir.join("expenses.csv"),
            intake_dir: dir.join("intake"),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs, ConfigError> {
    directories::ProjectDirs::from("org", "slipscan", "slipscan").ok_or(ConfigError::NoHome)
}

impl SlipConfig {
    /// Defaults with storage placed in the per-user data directory.
    pub fn for_user() -> Result<Self, ConfigError> {
        let dirs = project_dirs()?;
        Ok(Self {
            storage: StorageConfig::under(dirs.data_dir()),
            ..Self::default()
        })
    }

    /// `<config dir>/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&s, path)
    }

    fn from_toml(s: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Load `explicit` if given (it must exist); otherwise the default config
    /// file if present, falling back to [`SlipConfig::for_user`].
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let path = Self::default_path()?;
        if path.exists() {
            Self::from_file(&path)
        } else {
            Self::for_user()
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_err)
    }
}
