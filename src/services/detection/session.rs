// Detection Session
// Loads the corpus once, then answers detection requests:
// - lexical: TF-IDF report (informational)
// - semantic: embedding cosine per document (gate)
// - alignment + classification per document, fanned out over a bounded pool

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::aggregation::{aggregate_signals, DocumentSignals};
use super::alignment::align;
use super::classifier::classify_document;
use super::lexical::{check_scores, LexicalModel};
use super::semantic::{ModelStore, SemanticIndex};
use crate::models::{CorpusDocument, DocumentClassification, LexicalReport, PlagiarismVerdict};
use crate::services::config_store::{AppConfig, DetectionConfig};
use crate::services::corpus::load_corpus;
use crate::services::errors::{DetectionError, DetectionResult};
use crate::services::linguistic::LinguisticAnalyzer;
use crate::services::text_processor::Preprocessor;

/// Read-only corpus state shared by every request of one process.
pub struct DetectionSession<A: LinguisticAnalyzer> {
    preprocessor: Preprocessor<A>,
    corpus: Arc<Vec<CorpusDocument>>,
    lexical: LexicalModel,
    model_store: ModelStore,
    semantic: OnceCell<Arc<SemanticIndex>>,
    detection: DetectionConfig,
}

impl<A: LinguisticAnalyzer> DetectionSession<A> {
    /// Load and preprocess the corpus and fit the lexical index. The embedding
    /// model is prepared lazily on first semantic use.
    pub async fn open(config: &AppConfig, analyzer: Arc<A>) -> DetectionResult<Self> {
        let started = Instant::now();
        let preprocessor = Preprocessor::new(analyzer);
        let corpus = load_corpus(&config.corpus_dir, &preprocessor).await?;
        let session = Self::from_corpus(corpus, preprocessor, config)?;
        info!(
            "[SESSION] Ready: documents={}, vocabulary={}, elapsed_ms={}",
            session.corpus.len(),
            session.lexical.vocabulary_size(),
            started.elapsed().as_millis()
        );
        Ok(session)
    }

    /// Build a session over documents that were already preprocessed.
    pub fn from_corpus(
        corpus: Vec<CorpusDocument>,
        preprocessor: Preprocessor<A>,
        config: &AppConfig,
    ) -> DetectionResult<Self> {
        if corpus.is_empty() {
            return Err(DetectionError::CorpusUnavailable {
                path: config.corpus_dir.clone(),
                reason: "no documents".to_string(),
            });
        }
        let lexical = LexicalModel::fit(&corpus);
        Ok(Self {
            preprocessor,
            corpus: Arc::new(corpus),
            lexical,
            model_store: ModelStore::new(config.model_path.clone(), config.embedding.clone()),
            semantic: OnceCell::new(),
            detection: config.detection.clone(),
        })
    }

    pub fn corpus(&self) -> &[CorpusDocument] {
        &self.corpus
    }

    pub fn preprocessor(&self) -> &Preprocessor<A> {
        &self.preprocessor
    }

    pub fn lexical_model(&self) -> &LexicalModel {
        &self.lexical
    }

    /// Lexical check of raw text against the corpus.
    pub async fn check_similarity(&self, text: &str) -> DetectionResult<LexicalReport> {
        self.preprocessor.analyzer().begin_request().await;
        let (canonical, _) = self.preprocessor.preprocess_text(text).await?;
        Ok(self.lexical.check(&canonical, self.detection.lexical_threshold))
    }

    /// Embedding model and corpus vectors, built once per session.
    pub async fn semantic_index(&self) -> DetectionResult<Arc<SemanticIndex>> {
        let index = self
            .semantic
            .get_or_try_init(|| async {
                let token_lists: Vec<Vec<String>> = self.corpus.iter().map(|d| d.tokens.clone()).collect();
                let model = self.model_store.get_or_train(token_lists).await?;
                Ok::<_, DetectionError>(Arc::new(SemanticIndex::new(model, &self.corpus)))
            })
            .await?;
        Ok(Arc::clone(index))
    }

    /// Mean embedding of the preprocessed text; zero vector when no token is known.
    pub async fn vector(&self, text: &str) -> DetectionResult<Vec<f32>> {
        let (_, tokens) = self.preprocessor.preprocess_text(text).await?;
        Ok(self.semantic_index().await?.vector(&tokens))
    }

    pub async fn detect(&self, text: &str) -> DetectionResult<PlagiarismVerdict> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        self.preprocessor.analyzer().begin_request().await;
        let submission = self.preprocessor.submission(text).await?;
        info!(
            "[DETECT] request={} tokens={} sentences={} corpus={}",
            request_id,
            submission.tokens.len(),
            submission.sentences.len(),
            self.corpus.len()
        );

        let lexical_scores = self.lexical.score(&submission.canonical());
        let lexical_report = check_scores(lexical_scores.clone(), self.detection.lexical_threshold);

        let index = self.semantic_index().await?;
        let semantic_scores = index.scores(&index.vector(&submission.tokens));

        let classifications = if submission.is_empty() {
            vec![DocumentClassification::unmatched(); self.corpus.len()]
        } else {
            self.classify_corpus(Arc::new(submission.sentences)).await?
        };

        let signals: Vec<DocumentSignals> = self
            .corpus
            .iter()
            .enumerate()
            .map(|(i, doc)| DocumentSignals {
                filename: doc.id.clone(),
                semantic_similarity: semantic_scores.get(i).copied().unwrap_or(0.0),
                lexical_similarity: lexical_scores.get(i).map_or(0.0, |s| s.similarity),
                classification: classifications[i].clone(),
            })
            .collect();
        for s in &signals {
            debug!(
                "[DETECT] request={} doc={} semantic={:.4} lexical={:.4} matches={} edit={:?}",
                request_id,
                s.filename,
                s.semantic_similarity,
                s.lexical_similarity,
                s.classification.match_count,
                s.classification.edit_type
            );
        }

        let verdict = aggregate_signals(&signals, lexical_report, self.detection.semantic_threshold);
        info!(
            "[DETECT] request={} plagiarized={} documents={} edit_type={:?} elapsed_ms={}",
            request_id,
            verdict.plagiarized,
            verdict.per_document.len(),
            verdict.edit_type,
            started.elapsed().as_millis()
        );
        Ok(verdict)
    }

    /// Align and classify every corpus document against the submission
    /// sentences, at most `max_concurrency` documents at a time. Results come
    /// back in corpus order.
    async fn classify_corpus(
        &self,
        submission_sentences: Arc<Vec<String>>,
    ) -> DetectionResult<Vec<DocumentClassification>> {
        let semaphore = Arc::new(Semaphore::new(self.detection.max_concurrency.max(1)));
        let mut join_set: JoinSet<DetectionResult<(usize, DocumentClassification)>> = JoinSet::new();

        for index in 0..self.corpus.len() {
            let analyzer = Arc::clone(self.preprocessor.analyzer());
            let corpus = Arc::clone(&self.corpus);
            let sentences = Arc::clone(&submission_sentences);
            let semaphore = Arc::clone(&semaphore);
            let threshold = self.detection.alignment_threshold;

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| DetectionError::PreprocessingFailure(e.to_string()))?;
                let matches = align(&corpus[index].sentences, &sentences, threshold);
                let classification = classify_document(analyzer.as_ref(), &matches).await?;
                Ok((index, classification))
            });
        }

        let mut classifications = vec![DocumentClassification::unmatched(); self.corpus.len()];
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(Ok((index, classification))) => classifications[index] = classification,
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    return Err(DetectionError::PreprocessingFailure(format!(
                        "comparison task failed: {}",
                        e
                    )))
                }
            }
        }
        Ok(classifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EditType;
    use crate::services::config_store::EmbeddingConfig;
    use crate::services::linguistic::RuleBasedAnalyzer;
    use std::fs;
    use std::path::PathBuf;

    const DOG_STORY: &str = "The dog chased the ball across the yard. It was a sunny afternoon.";
    const VOLCANO: &str = "Volcanic eruptions reshape distant islands. Lava cools into black rock.";

    fn scratch_config() -> (PathBuf, AppConfig) {
        scratch_config_with(&[("a.txt", DOG_STORY), ("b.txt", VOLCANO)])
    }

    fn scratch_config_with(documents: &[(&str, &str)]) -> (PathBuf, AppConfig) {
        let root = std::env::temp_dir().join(format!("textmatch-session-{}", uuid::Uuid::new_v4()));
        let corpus_dir = root.join("files");
        fs::create_dir_all(&corpus_dir).unwrap();
        for (name, text) in documents {
            fs::write(corpus_dir.join(name), text).unwrap();
        }

        let config = AppConfig {
            corpus_dir,
            model_path: root.join("model.bin"),
            embedding: EmbeddingConfig {
                dimensions: 24,
                epochs: 10,
                min_count: 1,
                ..EmbeddingConfig::default()
            },
            ..AppConfig::default()
        };
        (root, config)
    }

    async fn open(config: &AppConfig) -> DetectionSession<RuleBasedAnalyzer> {
        DetectionSession::open(config, Arc::new(RuleBasedAnalyzer::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_verbatim_copy_is_plagiarized_without_label() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        let verdict = session.detect(DOG_STORY).await.unwrap();
        assert!(verdict.plagiarized);
        assert!(verdict.per_document.get("a.txt").copied().unwrap_or(0.0) > 0.99);
        assert_eq!(verdict.edit_type, None);
        assert!(verdict.lexical.documents().iter().any(|d| d.filename == "a.txt"));

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_single_document_exact_copy() {
        let (root, config) = scratch_config_with(&[("test.txt", "This is a test document.")]);
        let session = open(&config).await;

        let verdict = session.detect("This is a test document.").await.unwrap();
        let score = verdict.per_document.get("test.txt").copied().unwrap();
        assert!((score - 1.0).abs() < 1e-6);
        assert_eq!(verdict.edit_type, None);

        let greeting = session.detect("Hello").await.unwrap();
        assert!(!greeting.plagiarized);
        assert_eq!(greeting.lexical, LexicalReport::NoSimilarTexts);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_unrelated_text_is_not_plagiarized() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        let verdict = session
            .detect("Quantum computing promises exponential speedups.")
            .await
            .unwrap();
        assert!(!verdict.plagiarized);
        assert!(verdict.per_document.is_empty());
        assert_eq!(verdict.edit_type, None);
        assert_eq!(verdict.lexical, LexicalReport::NoSimilarTexts);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_tense_change_is_labelled() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        let verdict = session
            .detect("The dog chases the ball across the yard. It was a sunny afternoon.")
            .await
            .unwrap();
        assert!(verdict.plagiarized);
        assert_eq!(verdict.edit_type, Some(EditType::TenseChange));

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_swapped_sentences_are_reordering() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        let verdict = session
            .detect("It was a sunny afternoon. The dog chased the ball across the yard.")
            .await
            .unwrap();
        assert!(verdict.plagiarized);
        assert_eq!(verdict.edit_type, Some(EditType::Reordering));
        let doc = verdict.documents.iter().find(|d| d.filename == "a.txt").unwrap();
        assert_eq!(doc.inversion_count, 1);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_empty_submission_is_not_plagiarized() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        let verdict = session.detect("").await.unwrap();
        assert!(!verdict.plagiarized);
        assert_eq!(session.vector("").await.unwrap(), vec![0.0; 24]);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_check_similarity_reports_matching_document() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        match session.check_similarity(VOLCANO).await.unwrap() {
            LexicalReport::Similar(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].filename, "b.txt");
            }
            other => panic!("unexpected report: {:?}", other),
        }

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_model_is_trained_once_and_reused() {
        let (root, config) = scratch_config();

        let first = open(&config).await;
        let trained = first.semantic_index().await.unwrap();
        assert!(config.model_path.exists());

        let second = open(&config).await;
        let loaded = second.semantic_index().await.unwrap();
        assert_eq!(loaded.model(), trained.model());

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_shares_one_index() {
        let (root, config) = scratch_config();
        let session = open(&config).await;

        let (first, second) = tokio::join!(session.semantic_index(), session.semantic_index());
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &session.semantic_index().await.unwrap()));
        assert!(config.model_path.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_missing_corpus_fails_to_open() {
        let (root, mut config) = scratch_config();
        config.corpus_dir = root.join("does-not-exist");

        let result = DetectionSession::open(&config, Arc::new(RuleBasedAnalyzer::new())).await;
        assert!(matches!(result, Err(DetectionError::CorpusUnavailable { .. })));

        let _ = fs::remove_dir_all(&root);
    }
}
