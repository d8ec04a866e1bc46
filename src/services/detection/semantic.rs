// Semantic Similarity
// Embedding model lifecycle (load, train, persist under a single-writer lock)
// and document vectors for cosine scoring.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use super::embedding::{EmbeddingModel, EmbeddingTrainer};
use crate::models::CorpusDocument;
use crate::services::config_store::EmbeddingConfig;
use crate::services::errors::{DetectionError, DetectionResult};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STALE_LOCK_AGE: Duration = Duration::from_secs(600);

/// Cosine similarity clamped to [0, 1]; zero when either side has no magnitude.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (l, r) in left.iter().zip(right) {
        let (l, r) = (f64::from(*l), f64::from(*r));
        dot += l * r;
        left_norm += l * l;
        right_norm += r * r;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    (dot / (left_norm.sqrt() * right_norm.sqrt())).clamp(0.0, 1.0)
}

/// Removes the lock file when the writer is done, even on early return.
struct WriterLock {
    path: PathBuf,
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

enum LockAttempt {
    Acquired(WriterLock),
    Held,
    Unsupported(std::io::Error),
}

fn try_lock(lock_path: &Path) -> LockAttempt {
    match OpenOptions::new().write(true).create_new(true).open(lock_path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            LockAttempt::Acquired(WriterLock {
                path: lock_path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => LockAttempt::Held,
        Err(e) => LockAttempt::Unsupported(e),
    }
}

fn lock_is_stale(lock_path: &Path) -> bool {
    fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(false, |age| age > STALE_LOCK_AGE)
}

/// Owns the on-disk artifact for one model path.
pub struct ModelStore {
    path: PathBuf,
    config: EmbeddingConfig,
}

impl ModelStore {
    pub fn new(path: PathBuf, config: EmbeddingConfig) -> Self {
        Self { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn try_load(&self) -> Option<EmbeddingModel> {
        if !self.path.exists() {
            return None;
        }
        match EmbeddingModel::load(&self.path) {
            Ok(model) => {
                info!(
                    "[SEMANTIC] Loaded embedding model ({} words) from {}",
                    model.len(),
                    self.path.display()
                );
                Some(model)
            }
            Err(e) => {
                warn!("[SEMANTIC] Ignoring unreadable model artifact: {}", e);
                None
            }
        }
    }

    /// Reuse the persisted model when it reads back cleanly, otherwise train.
    /// At most one process trains and writes the artifact; the others wait
    /// for it while the lock is live. A lock older than `STALE_LOCK_AGE` is
    /// reclaimed. Without lock support the model is trained in memory only.
    pub async fn get_or_train(&self, token_lists: Vec<Vec<String>>) -> DetectionResult<EmbeddingModel> {
        if let Some(model) = self.try_load() {
            return Ok(model);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_path = self.lock_path();
        let mut announced_wait = false;
        loop {
            match try_lock(&lock_path) {
                LockAttempt::Acquired(_guard) => {
                    // Another writer may have finished between the first load and the lock.
                    if let Some(model) = self.try_load() {
                        return Ok(model);
                    }
                    let model = self.train(token_lists).await?;
                    if let Err(e) = self.persist(&model) {
                        warn!("[SEMANTIC] Failed to persist model: {}", e);
                    }
                    return Ok(model);
                }
                LockAttempt::Held if lock_is_stale(&lock_path) => {
                    warn!("[SEMANTIC] Removing stale model lock {}", lock_path.display());
                    let _ = fs::remove_file(&lock_path);
                }
                LockAttempt::Held => {
                    if !announced_wait {
                        info!("[SEMANTIC] Another writer holds {}, waiting", lock_path.display());
                        announced_wait = true;
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                LockAttempt::Unsupported(e) => {
                    warn!("[SEMANTIC] Cannot create model lock ({}), training in memory", e);
                    return self.train(token_lists).await;
                }
            }
        }
    }

    async fn train(&self, token_lists: Vec<Vec<String>>) -> DetectionResult<EmbeddingModel> {
        let trainer = EmbeddingTrainer::new(self.config.clone());
        let sentences = token_lists.len();
        let model = tokio::task::spawn_blocking(move || trainer.train(&token_lists))
            .await
            .map_err(|e| DetectionError::ModelUnavailable(format!("training task failed: {}", e)))?;
        info!(
            "[SEMANTIC] Trained embedding model: {} words, {} dims, {} documents",
            model.len(),
            model.dimensions(),
            sentences
        );
        Ok(model)
    }

    /// Write to a temp file beside the artifact, then rename over it.
    fn persist(&self, model: &EmbeddingModel) -> DetectionResult<()> {
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, model.to_bytes())?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        info!("[SEMANTIC] Persisted embedding model to {}", self.path.display());
        Ok(())
    }
}

/// Embedding model plus one mean vector per corpus document, corpus order.
pub struct SemanticIndex {
    model: EmbeddingModel,
    document_vectors: Vec<Vec<f32>>,
}

impl SemanticIndex {
    pub fn new(model: EmbeddingModel, corpus: &[CorpusDocument]) -> Self {
        let document_vectors = corpus.iter().map(|d| model.mean_vector(&d.tokens)).collect();
        Self {
            model,
            document_vectors,
        }
    }

    pub fn model(&self) -> &EmbeddingModel {
        &self.model
    }

    pub fn vector(&self, tokens: &[String]) -> Vec<f32> {
        self.model.mean_vector(tokens)
    }

    /// Cosine score of `vector` against every corpus document.
    pub fn scores(&self, vector: &[f32]) -> Vec<f64> {
        self.document_vectors
            .iter()
            .map(|doc| cosine_similarity(doc, vector))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("textmatch-model-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn small_config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: 12,
            epochs: 3,
            ..EmbeddingConfig::default()
        }
    }

    fn token_lists() -> Vec<Vec<String>> {
        vec![
            vec!["cat".into(), "sit".into(), "mat".into(), "cat".into()],
            vec!["dog".into(), "run".into(), "park".into(), "dog".into()],
        ]
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_model_is_persisted_and_reused() {
        let dir = scratch_dir();
        let store = ModelStore::new(dir.join("model.bin"), small_config());

        let trained = store.get_or_train(token_lists()).await.unwrap();
        assert!(store.path().exists());
        assert!(!store.lock_path().exists());

        // A second call must not need the training input.
        let loaded = store.get_or_train(Vec::new()).await.unwrap();
        assert_eq!(loaded, trained);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_retrained() {
        let dir = scratch_dir();
        let path = dir.join("model.bin");
        fs::write(&path, b"garbage").unwrap();

        let store = ModelStore::new(path.clone(), small_config());
        let model = store.get_or_train(token_lists()).await.unwrap();
        assert!(model.contains("cat"));
        assert!(EmbeddingModel::load(&path).is_ok());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_live_lock_waits_for_published_model() {
        let dir = scratch_dir();
        let path = dir.join("model.bin");
        let store = ModelStore::new(path.clone(), small_config());
        fs::write(store.lock_path(), b"12345").unwrap();
        assert!(!lock_is_stale(&store.lock_path()));

        let published = EmbeddingModel::from_vectors(2, vec![("zebra".to_string(), vec![0.5, 0.5])]).unwrap();
        let writer = {
            let writer_store = ModelStore::new(path.clone(), small_config());
            let published = published.clone();
            tokio::spawn(async move {
                // Longer than any fixed polling budget would allow.
                tokio::time::sleep(Duration::from_secs(6)).await;
                writer_store.persist(&published).unwrap();
                fs::remove_file(writer_store.lock_path()).unwrap();
            })
        };

        let model = store.get_or_train(token_lists()).await.unwrap();
        writer.await.unwrap();
        assert_eq!(model, published);
        assert!(!model.contains("cat"));
        assert!(!store.lock_path().exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_stale_lock_is_reclaimed_and_model_persisted() {
        let dir = scratch_dir();
        let store = ModelStore::new(dir.join("model.bin"), small_config());
        fs::write(store.lock_path(), b"12345").unwrap();
        let old = SystemTime::now() - STALE_LOCK_AGE - Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(store.lock_path())
            .unwrap()
            .set_modified(old)
            .unwrap();
        assert!(lock_is_stale(&store.lock_path()));

        let model = store.get_or_train(token_lists()).await.unwrap();
        assert!(model.contains("dog"));
        assert_eq!(EmbeddingModel::load(store.path()).unwrap(), model);
        assert!(!store.lock_path().exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_trains_once() {
        let dir = scratch_dir();
        let path = dir.join("model.bin");
        // Different seeds give different models, so equal results mean one training run.
        let first = ModelStore::new(path.clone(), small_config());
        let second = ModelStore::new(
            path.clone(),
            EmbeddingConfig {
                seed: small_config().seed + 1,
                ..small_config()
            },
        );

        let (a, b) = tokio::join!(first.get_or_train(token_lists()), second.get_or_train(token_lists()));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(EmbeddingModel::load(&path).unwrap(), a);
        assert!(!first.lock_path().exists());

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_index_scores_documents_in_corpus_order() {
        let model = EmbeddingModel::from_vectors(
            2,
            vec![
                ("cat".to_string(), vec![1.0, 0.0]),
                ("dog".to_string(), vec![0.0, 1.0]),
            ],
        )
        .unwrap();
        let corpus = vec![
            CorpusDocument {
                id: "a.txt".into(),
                raw_text: String::new(),
                tokens: vec!["cat".into()],
                sentences: Vec::new(),
            },
            CorpusDocument {
                id: "b.txt".into(),
                raw_text: String::new(),
                tokens: vec!["dog".into()],
                sentences: Vec::new(),
            },
        ];
        let index = SemanticIndex::new(model, &corpus);
        let query = index.vector(&["cat".to_string()]);
        let scores = index.scores(&query);
        assert!((scores[0] - 1.0).abs() < 1e-9);
        assert_eq!(scores[1], 0.0);
        assert!(index.scores(&index.vector(&[])).iter().all(|s| *s == 0.0));
    }
}
