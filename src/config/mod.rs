// Configuration management module
// TOML settings for the embedding/generation backends and on-disk layout

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, GenerationConfig, ProviderBackend, StorageConfig,
};

/// Resolve the working directory: an explicit override, or `~/.pdf-qa`
#[inline]
pub fn resolve_config_dir(
    override_dir: Option<&std::path::Path>,
) -> Result<std::path::PathBuf, ConfigError> {
    override_dir.map_or_else(Config::default_dir, |dir| Ok(dir.to_path_buf()))
}
