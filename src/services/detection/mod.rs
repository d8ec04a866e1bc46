// Detection Module
// Plagiarism detection core logic organized into specialized submodules:
// - lexical: TF-IDF index and cosine scoring
// - embedding: word-embedding trainer and artifact format
// - semantic: model lifecycle and document vectors
// - alignment: sentence matching ratio and order inversions
// - classifier: edit-type labelling of aligned sentences
// - aggregation: per-document signals into the final verdict
// - session: corpus-backed request orchestration

pub mod lexical;
pub mod embedding;
pub mod semantic;
pub mod alignment;
pub mod classifier;
pub mod aggregation;
pub mod session;

// Re-export commonly used functions
pub use lexical::{check_scores, LexicalModel};
pub use embedding::{EmbeddingModel, EmbeddingTrainer};
pub use semantic::{cosine_similarity, ModelStore, SemanticIndex};
pub use alignment::{align, detect_reordering, sentence_similarity, SequenceMatcher};
pub use classifier::{classify_document, classify_pair, edit_type_for_features, SentenceFeatures};
pub use aggregation::{aggregate_signals, DocumentSignals};
pub use session::DetectionSession;
