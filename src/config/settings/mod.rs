
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const CONFIG_FILE_NAME: &str = "config.toml";

const OLLAMA_BASE_URL: &str = "http://localhost:11434/";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which family of inference API a provider talks to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    /// Locally hosted Ollama runtime, no credential
    #[default]
    Ollama,
    /// Hosted OpenAI-compatible API, bearer credential from the environment
    OpenAi,
}

impl ProviderBackend {
    pub const ALL: [Self; 2] = [Self::Ollama, Self::OpenAi];

    #[inline]
    pub fn requires_api_key(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl fmt::Display for ProviderBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: ProviderBackend,
    pub base_url: String,
    pub model: String,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: ProviderBackend::Ollama,
            base_url: OLLAMA_BASE_URL.to_string(),
            model: "mxbai-embed-large".to_string(),
            batch_size: 16,
            timeout_seconds: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: ProviderBackend,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: ProviderBackend::Ollama,
            base_url: OLLAMA_BASE_URL.to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_seconds: 120,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub index_dir: PathBuf,
    pub upload_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("index"),
            upload_file: PathBuf::from("upload.pdf"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid URL scheme: {0} (must be 'http' or 'https')")]
    InvalidScheme(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid max tokens: {0} (must be between 1 and 32768)")]
    InvalidMaxTokens(u32),
    #[error("API key environment variable name cannot be empty for the {0} backend")]
    InvalidApiKeyEnv(ProviderBackend),
    #[error("Storage path for {0} cannot be empty")]
    EmptyStoragePath(&'static str),
    #[error("Storage path for {0} must be relative to the working directory without '.' or '..': {1}")]
    UnsafeStoragePath(&'static str, String),
    #[error("Index directory, upload file and config.toml must not overlap")]
    OverlappingStoragePaths,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default working directory, `~/.pdf-qa`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".pdf-qa"))
            .or_else(|| dirs::data_dir().map(|data| data.join("pdf-qa")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Defaults rooted at `base_dir`
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            storage: StorageConfig::default(),
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::with_base_dir(config_dir));
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.generation.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Directory holding the vector index. Relative paths resolve against the base directory.
    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.get_base_dir().join(&self.storage.index_dir)
    }

    /// Fixed path every upload is written to
    #[inline]
    pub fn upload_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.storage.upload_file)
    }
}

impl EmbeddingConfig {
    /// Settings for a hosted OpenAI embeddings deployment
    #[inline]
    pub fn hosted() -> Self {
        Self {
            backend: ProviderBackend::OpenAi,
            base_url: OPENAI_BASE_URL.to_string(),
            model: "text-embedding-3-small".to_string(),
            batch_size: 64,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        validate_timeout(self.timeout_seconds)?;

        if self.backend.requires_api_key() && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.backend));
        }

        Ok(())
    }

    #[inline]
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        validate_base_url(&self.base_url)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        validate_base_url(&base_url)?;
        self.base_url = base_url;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl GenerationConfig {
    /// Settings for a hosted Groq chat-completion deployment
    #[inline]
    pub fn hosted() -> Self {
        Self {
            backend: ProviderBackend::OpenAi,
            base_url: GROQ_BASE_URL.to_string(),
            model: "mixtral-8x7b-32768".to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if !(1..=32768).contains(&self.max_tokens) {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }

        validate_timeout(self.timeout_seconds)?;

        if self.backend.requires_api_key() && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.backend));
        }

        Ok(())
    }

    #[inline]
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        validate_base_url(&self.base_url)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        validate_base_url(&base_url)?;
        self.base_url = base_url;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath("index_dir"));
        }
        if self.upload_file.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath("upload_file"));
        }
        validate_storage_path("index_dir", &self.index_dir)?;
        validate_storage_path("upload_file", &self.upload_file)?;

        // The index directory is deleted on every clear
        let config_file = Path::new(CONFIG_FILE_NAME);
        if self.upload_file.starts_with(&self.index_dir)
            || config_file.starts_with(&self.index_dir)
            || self.upload_file == config_file
        {
            return Err(ConfigError::OverlappingStoragePaths);
        }
        Ok(())
    }
}

/// Storage paths are joined onto the working directory, so only plain names may appear
fn validate_storage_path(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Ok(())
    } else {
        Err(ConfigError::UnsafeStoragePath(
            field,
            path.display().to_string(),
        ))
    }
}

/// Parse a provider base URL, normalising it to end in `/` so relative joins keep its path
fn validate_base_url(base_url: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl(base_url.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl(base_url.to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn validate_timeout(timeout_seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&timeout_seconds) {
        return Err(ConfigError::InvalidTimeout(timeout_seconds));
    }
    Ok(())
}
