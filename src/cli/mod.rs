use crate::model::InputType;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "modeldeck")]
#[command(version, about = "Run pretrained text, image and audio models", long_about = None)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	/// List available models
	Models {
		/// Only show models that accept this kind of input
		#[arg(long, value_enum)]
		input_type: Option<InputType>,
	},

	/// Show details for one model
	Info {
		/// Model display name (e.g., "Whisper Tiny (EN) ASR")
		model: String,
	},

	/// Run a model once and print its output
	Run {
		/// Kind of input being passed
		#[arg(long, value_enum)]
		input_type: InputType,

		/// Model display name
		#[arg(long)]
		model: String,

		/// Text to analyze, or a path to an image/audio file
		data: String,

		/// Device to run on (e.g., "cpu" or "cuda:0"); overrides MODELDECK_DEVICE
		#[arg(long)]
		device: Option<String>,
	},

	/// Download a model's files ahead of time
	Pull {
		/// Model display name
		model: String,
	},

	/// Start the HTTP API server (models loaded on-demand)
	Serve {
		/// Device to run on (e.g., "cpu" or "cuda:0"); overrides MODELDECK_DEVICE
		#[arg(long)]
		device: Option<String>,

		/// Port to listen on
		#[arg(long, default_value = "8080")]
		port: u16,

		/// Host to bind to
		#[arg(long, default_value = "0.0.0.0")]
		host: String,
	},
}
