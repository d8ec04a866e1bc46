// Aggregation Logic
// Combines per-document semantic scores and edit classifications into the
// overall plagiarism verdict

use std::collections::BTreeMap;

use crate::models::{DocumentClassification, DocumentVerdict, LexicalReport, PlagiarismVerdict};

/// Everything measured for one corpus document during a request.
#[derive(Debug, Clone)]
pub struct DocumentSignals {
    pub filename: String,
    pub semantic_similarity: f64,
    pub lexical_similarity: f64,
    pub classification: DocumentClassification,
}

/// Build the verdict from signals given in corpus order.
///
/// Only documents whose semantic similarity is strictly above
/// `semantic_threshold` are reported. The edit type comes from the last
/// document in corpus order that had aligned sentences, and is only reported
/// when at least one document passed the semantic gate.
pub fn aggregate_signals(
    signals: &[DocumentSignals],
    lexical: LexicalReport,
    semantic_threshold: f64,
) -> PlagiarismVerdict {
    let gated: Vec<&DocumentSignals> = signals
        .iter()
        .filter(|s| s.semantic_similarity > semantic_threshold)
        .collect();

    if gated.is_empty() {
        return PlagiarismVerdict::not_plagiarized(lexical);
    }

    let per_document: BTreeMap<String, f64> = gated
        .iter()
        .map(|s| (s.filename.clone(), s.semantic_similarity))
        .collect();

    let edit_type = signals
        .iter()
        .rev()
        .find(|s| s.classification.has_matches())
        .and_then(|s| s.classification.edit_type);

    let documents = gated
        .iter()
        .map(|s| DocumentVerdict {
            filename: s.filename.clone(),
            semantic_similarity: s.semantic_similarity,
            lexical_similarity: s.lexical_similarity,
            match_count: s.classification.match_count,
            inversion_count: s.classification.inversion_count,
            edit_type: s.classification.edit_type,
        })
        .collect();

    PlagiarismVerdict {
        per_document,
        edit_type,
        plagiarized: true,
        documents,
        lexical,
    }
}
