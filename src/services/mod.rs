// TextMatch Core Services

pub mod errors;
pub mod config_store;
pub mod text_processor;
pub mod corpus;
pub mod linguistic;
pub mod detection;

pub use errors::{DetectionError, DetectionResult};
pub use config_store::*;
pub use text_processor::*;
pub use corpus::{list_corpus_files, load_corpus};
pub use linguistic::{
    AnalyzerError,
    HybridAnalyzer,
    LinguisticAnalyzer,
    RuleBasedAnalyzer,
    SpacyServiceClient,
    TokenAnnotation,
};

// Re-export detection module functions
pub use detection::{
    align,
    classify_document,
    classify_pair,
    cosine_similarity,
    detect_reordering,
    DetectionSession,
    LexicalModel,
    SemanticIndex,
};
