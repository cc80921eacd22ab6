#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;
use std::time::Duration;

use super::{Config, ConfigError, EmbeddingConfig, GenerationConfig, ProviderBackend};
use crate::embeddings::OllamaEmbeddings;

const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 PDF Q&A Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Used to index document pages and questions.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Generation Provider").bold().yellow());
    eprintln!("Used to write answers from the retrieved pages.");
    eprintln!();
    configure_generation(&mut config.generation)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());
    report_connection("Embedding", config.embedding.backend, || {
        test_ollama_model(&config.embedding.base_url, &config.embedding.model)
    });
    report_connection("Generation", config.generation.backend, || {
        test_ollama_model(&config.generation.base_url, &config.generation.model)
    });
    report_api_key("Embedding", config.embedding.backend, &config.embedding.api_key_env);
    report_api_key(
        "Generation",
        config.generation.backend,
        &config.generation.api_key_env,
    );

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Backend: {}", style(config.embedding.backend).cyan());
    eprintln!("  Base URL: {}", style(&config.embedding.base_url).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.embedding.timeout_seconds).cyan()
    );
    if config.embedding.backend.requires_api_key() {
        eprintln!("  API key from: ${}", style(&config.embedding.api_key_env).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Generation Settings:").bold().yellow());
    eprintln!("  Backend: {}", style(config.generation.backend).cyan());
    eprintln!("  Base URL: {}", style(&config.generation.base_url).cyan());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );
    eprintln!("  Max Tokens: {}", style(config.generation.max_tokens).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.generation.timeout_seconds).cyan()
    );
    if config.generation.backend.requires_api_key() {
        eprintln!(
            "  API key from: ${}",
            style(&config.generation.api_key_env).cyan()
        );
    }

    eprintln!();
    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!("  Index: {}", style(config.index_dir().display()).cyan());
    eprintln!("  Upload: {}", style(config.upload_path().display()).cyan());

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if !config_dir.join(super::settings::CONFIG_FILE_NAME).exists() {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        return Ok(Config::with_base_dir(config_dir));
    }

    Config::load(config_dir).map_or_else(
        |e| {
            eprintln!(
                "{} {:#}",
                style("Existing configuration is invalid, starting from defaults:").yellow(),
                e
            );
            Ok(Config::with_base_dir(config_dir))
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn select_backend(prompt: &str, current: ProviderBackend) -> Result<ProviderBackend> {
    let labels = [
        "ollama (local runtime)",
        "openai (hosted OpenAI-compatible API)",
    ];
    let default_index = ProviderBackend::ALL
        .iter()
        .position(|&b| b == current)
        .unwrap_or(0);

    let index = Select::new()
        .with_prompt(prompt)
        .default(default_index)
        .items(&labels)
        .interact()?;

    Ok(ProviderBackend::ALL[index])
}

fn input_base_url(prompt: &str, current: &str) -> Result<String> {
    let url: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            GenerationConfig {
                base_url: input.clone(),
                ..GenerationConfig::default()
            }
            .endpoint()
            .map(|_| ())
        })
        .interact_text()?;
    Ok(url)
}

fn input_model(prompt: &str, current: &str) -> Result<String> {
    let model: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(model)
}

fn input_api_key_env(current: &str) -> Result<String> {
    let var: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Variable name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(var)
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let backend = select_backend("Embedding backend", embedding.backend)?;
    if backend != embedding.backend {
        *embedding = match backend {
            ProviderBackend::Ollama => EmbeddingConfig::default(),
            ProviderBackend::OpenAi => EmbeddingConfig::hosted(),
        };
    }

    let base_url = input_base_url("Embedding API base URL", &embedding.base_url)?;
    let model = input_model("Embedding model", &embedding.model)?;

    let batch_size: u32 = Input::new()
        .with_prompt("Pages per embedding request")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    if backend.requires_api_key() {
        embedding.api_key_env = input_api_key_env(&embedding.api_key_env)?;
    }

    embedding.set_base_url(base_url)?;
    embedding.set_model(model)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let backend = select_backend("Generation backend", generation.backend)?;
    if backend != generation.backend {
        *generation = match backend {
            ProviderBackend::Ollama => GenerationConfig::default(),
            ProviderBackend::OpenAi => GenerationConfig::hosted(),
        };
    }

    let base_url = input_base_url("Generation API base URL", &generation.base_url)?;
    let model = input_model("Generation model", &generation.model)?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(generation.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    if backend.requires_api_key() {
        generation.api_key_env = input_api_key_env(&generation.api_key_env)?;
    }

    generation.set_base_url(base_url)?;
    generation.set_model(model)?;
    generation.set_temperature(temperature)?;

    Ok(())
}

fn report_connection(
    label: &str,
    backend: ProviderBackend,
    check: impl FnOnce() -> Result<()>,
) {
    if backend != ProviderBackend::Ollama {
        return;
    }

    match check() {
        Ok(()) => eprintln!(
            "{}",
            style(format!("✓ {} model is available in Ollama", label)).green()
        ),
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: {} check failed: {:#}", label, e)).yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running and the model is pulled.");
        }
    }
}

fn report_api_key(label: &str, backend: ProviderBackend, api_key_env: &str) {
    if !backend.requires_api_key() {
        return;
    }

    if std::env::var(api_key_env).is_ok_and(|key| !key.trim().is_empty()) {
        eprintln!(
            "{}",
            style(format!("✓ {} API key found in ${}", label, api_key_env)).green()
        );
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: ${} is not set", api_key_env)).yellow()
        );
        eprintln!("Set it before starting a session.");
    }
}

/// Ask the Ollama runtime at `base_url` whether `model` has been pulled
fn test_ollama_model(base_url: &str, model: &str) -> Result<()> {
    let probe = EmbeddingConfig {
        base_url: base_url.to_string(),
        model: model.to_string(),
        ..EmbeddingConfig::default()
    };
    OllamaEmbeddings::new(&probe)?
        .with_timeout(CONNECTION_TEST_TIMEOUT)
        .health_check()
}
