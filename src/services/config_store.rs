// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{DetectionError, DetectionResult};
use super::linguistic::DEFAULT_SERVICE_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            corpus_dir: default_corpus_dir(),
            model_path: default_model_path(),
            analyzer: AnalyzerConfig::default(),
            detection: DetectionConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub fallback_to_rules: bool,
    /// Skip the spaCy service entirely.
    #[serde(default)]
    pub rules_only: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            timeout_secs: default_timeout_secs(),
            fallback_to_rules: true,
            rules_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_lexical_threshold")]
    pub lexical_threshold: f64,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
    #[serde(default = "default_alignment_threshold")]
    pub alignment_threshold: f64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            lexical_threshold: default_lexical_threshold(),
            semantic_threshold: default_semantic_threshold(),
            alignment_threshold: default_alignment_threshold(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Hyperparameters for the word-embedding trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_negative")]
    pub negative: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            window: default_window(),
            min_count: default_min_count(),
            epochs: default_epochs(),
            negative: default_negative(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_corpus_dir() -> PathBuf { PathBuf::from("dataset/files") }
fn default_model_path() -> PathBuf { PathBuf::from("word2vec_model.bin") }
fn default_service_url() -> String { DEFAULT_SERVICE_URL.to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_true() -> bool { true }
fn default_lexical_threshold() -> f64 { 0.3 }
fn default_semantic_threshold() -> f64 { 0.7 }
fn default_alignment_threshold() -> f64 { 0.7 }
fn default_max_concurrency() -> usize { 4 }
fn default_dimensions() -> usize { 150 }
fn default_window() -> usize { 2 }
fn default_min_count() -> usize { 2 }
fn default_epochs() -> usize { 50 }
fn default_negative() -> usize { 5 }
fn default_learning_rate() -> f32 { 0.025 }
fn default_seed() -> u64 { 1 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("textmatch"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> DetectionResult<()> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| DetectionError::Config(format!("Failed to create config dir: {}", e)))
    }

    /// Load configuration from file
    pub fn load(&self) -> DetectionResult<AppConfig> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| DetectionError::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| DetectionError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> DetectionResult<()> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| DetectionError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_file, content)
            .map_err(|e| DetectionError::Config(format!("Failed to write config: {}", e)))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> DetectionResult<()> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| DetectionError::Config(format!("Failed to create backup dir: {}", e)))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| DetectionError::Config(format!("Failed to create backup: {}", e)))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> DetectionResult<()> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| DetectionError::Config(format!("Failed to read backup dir: {}", e)))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Sort by modification time (oldest first)
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        // Remove oldest entries
        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("textmatch-config-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.lexical_threshold, 0.3);
        assert_eq!(config.detection.semantic_threshold, 0.7);
        assert_eq!(config.detection.alignment_threshold, 0.7);
        assert_eq!(config.embedding.dimensions, 150);
        assert_eq!(config.embedding.window, 2);
        assert_eq!(config.embedding.min_count, 2);
        assert!(config.analyzer.fallback_to_rules);
    }

    #[test]
    fn test_partial_config_uses_field_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"corpusDir":"corpus","detection":{"semanticThreshold":0.8}}"#).unwrap();
        assert_eq!(parsed.corpus_dir, PathBuf::from("corpus"));
        assert_eq!(parsed.detection.semantic_threshold, 0.8);
        assert_eq!(parsed.detection.lexical_threshold, 0.3);
        assert_eq!(parsed.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let store = ConfigStore::new(scratch_dir());
        let config = store.load().unwrap();
        assert_eq!(config.model_path, PathBuf::from("word2vec_model.bin"));
    }

    #[test]
    fn test_save_and_reload_with_backup() {
        let dir = scratch_dir();
        let store = ConfigStore::new(dir.clone());

        let mut config = AppConfig::default();
        config.detection.max_concurrency = 8;
        store.save(&config).unwrap();
        config.analyzer.rules_only = true;
        store.save(&config).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.detection.max_concurrency, 8);
        assert!(reloaded.analyzer.rules_only);
        let backups = fs::read_dir(dir.join("backups")).unwrap().count();
        assert_eq!(backups, 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
