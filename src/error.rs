#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Model not found: {0}")]
	ModelNotFound(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	/// Uniform failure for anything that goes wrong while building or running a model.
	#[error("Failed to run the model: {0}")]
	Execution(String),

	#[error("A model run is already in progress")]
	Busy,

	#[error("Download failed: {0}")]
	DownloadFailed(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	SerializationError(String),
}

impl Error {
	/// Folds any error into [`Error::Execution`], keeping the original message.
	pub fn into_execution(self) -> Self {
		match self {
			Error::Execution(_) => self,
			other => Error::Execution(other.to_string()),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

#[cfg(feature = "candle")]
impl From<candle_core::Error> for Error {
	fn from(err: candle_core::Error) -> Self {
		Error::Execution(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
