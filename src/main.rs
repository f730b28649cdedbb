mod backend;
mod cli;
mod config;
mod error;
mod handler;
mod manager;
mod model;
mod server;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use error::Error;
use manager::ModelManager;
use model::{ModelDownloader, Registry};

fn lookup<'a>(registry: &'a Registry, name: &str) -> error::Result<&'a model::ModelMeta> {
    registry
        .find_by_human_name(name)
        .ok_or_else(|| Error::ModelNotFound(name.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to set up data directory")?;
    let registry = Registry::load(&config)
        .with_context(|| format!("Failed to load catalog {:?}", config.catalog_path))?;

    match cli.command {
        Commands::Models { input_type } => {
            let models = match input_type {
                Some(input_type) => registry.models_for(input_type),
                None => registry.list_models().iter().collect(),
            };

            if models.is_empty() {
                println!("No models available for this input type.");
            } else {
                println!("Available models:\n");
                for model in models {
                    println!("  {}", model.human_name);
                    println!("    Input: {}", model.input_type());
                    println!("    Category: {}", model.category);
                    println!("    Repository: {}", model.model_id);
                    println!();
                }
            }
        }

        Commands::Info { model } => {
            let meta = lookup(&registry, &model)?;

            println!("{}", meta.human_name);
            println!("  Input: {}", meta.input_type());
            println!("  Category: {}", meta.category);
            println!("  Task: {}", meta.task);
            println!("  Repository: {}", meta.model_id);
            println!("\n{}", meta.description);
        }

        Commands::Run {
            input_type,
            model,
            data,
            device,
        } => {
            input_type.validate(&data)?;
            let meta = lookup(&registry, &model)?.clone();

            if let Some(device) = device {
                config.device = device;
            }
            let manager = ModelManager::new(backend::default_backend(&config)?);

            tracing::info!("Running '{}' on {} input", meta.human_name, input_type);
            let output = tokio::task::spawn_blocking(move || manager.run(&meta, input_type, &data))
                .await
                .context("Model worker panicked")??;

            println!("{}", output);
        }

        Commands::Pull { model } => {
            let meta = lookup(&registry, &model)?;
            let downloader = ModelDownloader::new(&config)?;
            let files = downloader.fetch(&meta.model_id)?;

            println!("✓ Successfully pulled model: {}", meta.human_name);
            println!("  Repository: {}", meta.model_id);
            println!("  Path: {:?}", files.model_dir);
        }

        Commands::Serve { device, port, host } => {
            if let Some(device) = device {
                config.device = device;
            }
            let manager = ModelManager::new(backend::default_backend(&config)?);
            let state = server::AppState::new(manager, registry, config.device.clone());

            println!("🚀 Modeldeck server starting...");
            println!("   Device: {}", config.device);
            println!("   Listening on: http://{}:{}", host, port);
            println!("   Health: http://{}:{}/api/health", host, port);
            println!("   Models: http://{}:{}/api/models", host, port);
            println!("   Run: http://{}:{}/api/run", host, port);
            println!("\n   Models will be loaded on-demand when requested via API");

            server::serve(&host, port, state).await?;
        }
    }

    Ok(())
}
