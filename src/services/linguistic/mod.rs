// Linguistic Analysis Capability
// Sentence segmentation, lemmatization and part-of-speech annotation.
// - service_client: spaCy HTTP service (primary)
// - rules: local rule-based analyzer (fallback / offline)

pub mod rules;
pub mod service_client;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};

pub use rules::RuleBasedAnalyzer;
pub use service_client::{SpacyServiceClient, DEFAULT_SERVICE_URL};

use crate::services::config_store::AnalyzerConfig;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analysis service error: {status} - {message}")]
    Service { status: u16, message: String },
    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),
}

/// One analysed token. `pos` is the coarse universal tag (`VERB`, `PRON`, ...),
/// `tag` the fine-grained Penn Treebank tag (`VBD`, `PRP`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAnnotation {
    pub text: String,
    pub lemma: String,
    pub pos: String,
    pub tag: String,
}

impl TokenAnnotation {
    pub fn is_verb(&self) -> bool {
        self.pos == "VERB"
    }

    pub fn is_pronoun(&self) -> bool {
        self.pos == "PRON"
    }
}

pub trait LinguisticAnalyzer: Send + Sync + 'static {
    /// Sentences in document order, trimmed, without empties.
    fn split_sentences(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<String>, AnalyzerError>> + Send;

    /// One lemma per input token, same order.
    fn lemmatize(
        &self,
        tokens: &[String],
    ) -> impl Future<Output = Result<Vec<String>, AnalyzerError>> + Send;

    fn annotate(
        &self,
        sentence: &str,
    ) -> impl Future<Output = Result<Vec<TokenAnnotation>, AnalyzerError>> + Send;

    /// Called once before each detection request.
    fn begin_request(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// spaCy service with local fallback. After one failed service call every
/// later call uses the rules, so a request never mixes annotation sources.
/// The service health is checked again at the next request.
pub struct HybridAnalyzer {
    service: Option<SpacyServiceClient>,
    rules: RuleBasedAnalyzer,
    fallback_to_rules: bool,
    service_down: AtomicBool,
}

impl HybridAnalyzer {
    pub fn new(service: Option<SpacyServiceClient>, fallback_to_rules: bool) -> Self {
        Self {
            service,
            rules: RuleBasedAnalyzer::new(),
            fallback_to_rules,
            service_down: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, AnalyzerError> {
        if config.rules_only {
            return Ok(Self::new(None, true));
        }
        let client = SpacyServiceClient::with_timeout(&config.service_url, config.timeout_secs)?;
        Ok(Self::new(Some(client), config.fallback_to_rules))
    }

    pub fn rules_only() -> Self {
        Self::new(None, true)
    }

    fn live_service(&self) -> Option<&SpacyServiceClient> {
        self.service
            .as_ref()
            .filter(|_| !self.service_down.load(Ordering::Acquire))
    }

    fn recover(&self, op: &str, err: AnalyzerError) -> Result<(), AnalyzerError> {
        if self.fallback_to_rules {
            warn!("[ANALYZER] spaCy {} unavailable ({}), falling back to local rules", op, err);
            self.service_down.store(true, Ordering::Release);
            Ok(())
        } else {
            Err(err)
        }
    }
}

impl LinguisticAnalyzer for HybridAnalyzer {
    async fn split_sentences(&self, text: &str) -> Result<Vec<String>, AnalyzerError> {
        if let Some(service) = self.live_service() {
            match service.split_sentences(text).await {
                Ok(sentences) => return Ok(sentences),
                Err(e) => self.recover("segment", e)?,
            }
        }
        self.rules.split_sentences(text).await
    }

    async fn lemmatize(&self, tokens: &[String]) -> Result<Vec<String>, AnalyzerError> {
        if let Some(service) = self.live_service() {
            match service.lemmatize(tokens).await {
                Ok(lemmas) => return Ok(lemmas),
                Err(e) => self.recover("lemmatize", e)?,
            }
        }
        self.rules.lemmatize(tokens).await
    }

    async fn annotate(&self, sentence: &str) -> Result<Vec<TokenAnnotation>, AnalyzerError> {
        if let Some(service) = self.live_service() {
            match service.annotate(sentence).await {
                Ok(tokens) => return Ok(tokens),
                Err(e) => self.recover("annotate", e)?,
            }
        }
        self.rules.annotate(sentence).await
    }

    async fn begin_request(&self) {
        let Some(service) = &self.service else {
            return;
        };
        if self.service_down.load(Ordering::Acquire) && service.is_available().await {
            info!("[ANALYZER] spaCy service is back, leaving local rules");
            self.service_down.store(false, Ordering::Release);
        }
    }
}
