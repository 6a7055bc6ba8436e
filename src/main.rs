mod cli;
mod config;
mod error;
mod model;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use model::{ModelDownloader, ModelRegistry};

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(registry) = &cli.registry {
        config.registry_url = registry.clone();
    }
    if let Some(models_dir) = &cli.models_dir {
        config.models_dir = models_dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Fetch {
            src_lang,
            trg_lang,
            domain,
        } => {
            let registry = ModelRegistry::fetch(&config.registry_url, &src_lang, &domain)?;
            if !registry.contains(&trg_lang) {
                println!("Sorry, model not available.");
                return Ok(());
            }

            let downloader = ModelDownloader::new(&config, registry);
            let model = match downloader.download_model(&trg_lang) {
                Ok(model) => model,
                Err(error::Error::IncompleteDownload { src, trg, failures }) => {
                    eprintln!("Download of model for {}-{} FAILED.", src, trg);
                    for failure in &failures {
                        eprintln!("  ✗ {}", failure);
                    }
                    std::process::exit(1);
                }
                Err(e) => return Err(e),
            };

            tracing::debug!(
                load_model = ?&model.config["training"]["load_model"],
                "Config rewritten for local use"
            );
            println!(
                "Please find your JoeyNMT Masakhane model in {}.",
                model.model_dir.display()
            );
            println!(
                "This model is {}lowercased.",
                if model.lowercased { "" } else { "not " }
            );
        }

        Commands::CheckAll {
            src_lang,
            domain,
            json,
        } => {
            let registry = ModelRegistry::fetch(&config.registry_url, &src_lang, &domain)?;
            let downloader = ModelDownloader::new(&config, registry);
            let report = downloader.download_and_check_all_models();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "✓ Succeeded ({}/{}): {}",
                    report.succeeded.len(),
                    report.total(),
                    report.succeeded.join(", ")
                );
                println!(
                    "✗ Failed ({}/{}): {}",
                    report.failed.len(),
                    report.total(),
                    report.failed.join(", ")
                );
            }
        }

        Commands::List { src_lang, domain } => {
            let registry = ModelRegistry::fetch(&config.registry_url, &src_lang, &domain)?;

            if registry.is_empty() {
                println!("No models available for source language '{}'.", src_lang);
            } else {
                println!(
                    "Available models for '{}' ({}):\n",
                    src_lang,
                    registry.len()
                );
                for (trg_lang, descriptor) in registry.iter() {
                    println!("  {}-{}", src_lang, trg_lang);
                    println!("    Domain: {}", descriptor.get("domain").unwrap_or("-"));
                }
            }
        }
    }

    Ok(())
}
