use crate::model::source::FetchError;
use std::fmt;

/// One component file that could not be downloaded.
#[derive(Debug, Clone)]
pub struct FileFailure {
	pub part: &'static str,
	pub url: String,
	pub reason: FetchError,
}

impl fmt::Display for FileFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({}): {}", self.part, self.url, self.reason)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Model not found: {0}")]
	ModelNotFound(String),

	#[error("Malformed registry at line {line}: expected {expected} fields, found {found}")]
	MalformedRegistry {
		line: usize,
		expected: usize,
		found: usize,
	},

	#[error("Registry entry is missing column '{0}'")]
	MissingColumn(String),

	#[error("Download of model for {src}-{trg} failed: {} of 6 files missing", .failures.len())]
	IncompleteDownload {
		src: String,
		trg: String,
		failures: Vec<FileFailure>,
	},

	#[error("Invalid model config: {0}")]
	InvalidConfig(String),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("Serialization error: {0}")]
	SerializationError(String),
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
