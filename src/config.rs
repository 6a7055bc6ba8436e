use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str =
	"https://raw.githubusercontent.com/juliakreutzer/masakhane-eval/master/models/available_models.tsv";
pub const DEFAULT_MODELS_DIR: &str = "joeynmt/models";
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
	/// URL or local path of the TSV model registry
	pub registry_url: String,
	pub models_dir: PathBuf,
	/// Pause before every remote request
	pub request_delay_ms: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			registry_url: DEFAULT_REGISTRY_URL.to_string(),
			models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
			request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
		}
	}
}

impl Config {
	/// Resolve configuration from an optional TOML file and the environment.
	///
	/// Without an explicit path the platform config directory is consulted
	/// (`<config dir>/masakhane-loader/config.toml`); a missing default file is
	/// not an error.
	pub fn load(path: Option<&Path>) -> crate::error::Result<Self> {
		let config = match path {
			Some(path) => Self::from_file(path)?,
			None => match Self::default_path() {
				Some(path) if path.exists() => Self::from_file(&path)?,
				_ => Self::default(),
			},
		};

		config.with_env_overrides()
	}

	pub fn from_file(path: &Path) -> crate::error::Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| {
			crate::error::Error::ConfigError(format!("Could not read {}: {}", path.display(), e))
		})?;
		let config: Config = toml::from_str(&content)?;
		tracing::debug!("Loaded configuration from {}", path.display());
		Ok(config)
	}

	fn default_path() -> Option<PathBuf> {
		ProjectDirs::from("", "", "masakhane-loader")
			.map(|dirs| dirs.config_dir().join("config.toml"))
	}

	fn with_env_overrides(mut self) -> crate::error::Result<Self> {
		if let Ok(url) = std::env::var("MASAKHANE_REGISTRY_URL") {
			self.registry_url = url;
		}
		if let Ok(dir) = std::env::var("MASAKHANE_MODELS_DIR") {
			self.models_dir = PathBuf::from(dir);
		}
		if let Ok(delay) = std::env::var("MASAKHANE_REQUEST_DELAY_MS") {
			self.request_delay_ms = delay.parse().map_err(|_| {
				crate::error::Error::ConfigError(format!(
					"MASAKHANE_REQUEST_DELAY_MS must be a number of milliseconds, got '{}'",
					delay
				))
			})?;
		}
		Ok(self)
	}

	pub fn request_delay(&self) -> Duration {
		Duration::from_millis(self.request_delay_ms)
	}
}
