use super::{load_existing_config as load_existing_config_impl, test_ollama_model};
use crate::config::{Config, ProviderBackend};
use tempfile::TempDir;

#[test]
fn load_existing_config_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(config.embedding.backend, ProviderBackend::Ollama);
    assert!(!config.embedding.model.is_empty());
    assert!(config.embedding.batch_size > 0);
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn load_existing_config_from_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::with_base_dir(temp_dir.path());
    config.generation.model = "qwen2.5".to_string();
    config.save().expect("should save config");

    let loaded = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(loaded.generation.model, "qwen2.5");
}

#[test]
fn invalid_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding]\nbatch_size = 0\n",
    )
    .expect("should write config");

    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(config.embedding.batch_size, 16);
}

#[test]
fn unreachable_ollama_fails_model_check() {
    assert!(test_ollama_model("http://127.0.0.1:9/", "llama3.2").is_err());
}
