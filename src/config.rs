use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_DEVICE: &str = "cpu";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub data_dir: PathBuf,
	pub models_dir: PathBuf,
	pub catalog_path: PathBuf,
	pub device: String,
}

impl Config {
	pub fn new() -> crate::error::Result<Self> {
		let project_dirs = ProjectDirs::from("", "", "modeldeck")
			.ok_or_else(|| crate::error::Error::ConfigError("Could not determine config directory".to_string()))?;

		Self::with_data_dir(project_dirs.data_dir().to_path_buf())
	}

	pub fn from_env() -> crate::error::Result<Self> {
		let mut config = match std::env::var("MODELDECK_DATA_DIR") {
			Ok(data_dir) => Self::with_data_dir(PathBuf::from(data_dir))?,
			Err(_) => Self::new()?,
		};

		if let Ok(device) = std::env::var("MODELDECK_DEVICE") {
			config.device = device;
		}

		Ok(config)
	}

	pub fn with_data_dir(data_dir: PathBuf) -> crate::error::Result<Self> {
		let models_dir = data_dir.join("models");
		let catalog_path = data_dir.join("catalog.toml");

		std::fs::create_dir_all(&data_dir)?;
		std::fs::create_dir_all(&models_dir)?;

		Ok(Self {
			data_dir,
			models_dir,
			catalog_path,
			device: DEFAULT_DEVICE.to_string(),
		})
	}
}
