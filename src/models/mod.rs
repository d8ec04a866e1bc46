// TextMatch Data Models
// Corpus documents, sentence matches and the final plagiarism verdict

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============ Documents ============

/// A reference document loaded once at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusDocument {
    /// File name inside the corpus directory; doubles as the document id.
    pub id: String,
    pub raw_text: String,
    /// Lemmas in document order, stop-words removed.
    pub tokens: Vec<String>,
    pub sentences: Vec<String>,
}

impl CorpusDocument {
    /// Canonical string fed to the lexical index.
    pub fn canonical(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Per-request text under inspection. Same shape as a corpus document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub raw_text: String,
    pub tokens: Vec<String>,
    pub sentences: Vec<String>,
}

impl Submission {
    pub fn canonical(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.sentences.is_empty()
    }
}

// ============ Alignment ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceMatch {
    pub corpus_index: usize,
    pub submission_index: usize,
    pub corpus_sentence: String,
    pub submission_sentence: String,
    /// Matching ratio in [0, 1]; 1.0 means the sentences are identical.
    pub similarity: f64,
}

impl SentenceMatch {
    pub fn is_verbatim(&self) -> bool {
        self.similarity >= 1.0
    }
}

/// Two adjacent matches whose relative order differs between the documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossingInversion {
    pub first: SentenceMatch,
    pub second: SentenceMatch,
}

// ============ Classification ============

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditType {
    VoiceChange,
    TenseChange,
    Reordering,
    Modification,
}

impl EditType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::VoiceChange => "Voice change",
            Self::TenseChange => "Tense change",
            Self::Reordering => "Sentence reordering",
            Self::Modification => "Sentence modification",
        }
    }
}

impl std::fmt::Display for EditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Alignment-side outcome for one corpus document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentClassification {
    pub match_count: usize,
    pub inversion_count: usize,
    /// `None` when nothing matched, or when every match is verbatim and in order.
    pub edit_type: Option<EditType>,
}

impl DocumentClassification {
    pub fn unmatched() -> Self {
        Self {
            match_count: 0,
            inversion_count: 0,
            edit_type: None,
        }
    }

    pub fn has_matches(&self) -> bool {
        self.match_count > 0
    }
}

// ============ Lexical ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentScore {
    pub filename: String,
    pub similarity: f64,
}

/// Result of a lexical check. Distinguishes "ran, nothing above threshold"
/// from a populated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "documents", rename_all = "camelCase")]
pub enum LexicalReport {
    Similar(Vec<DocumentScore>),
    NoSimilarTexts,
}

impl LexicalReport {
    pub const NO_SIMILAR_MESSAGE: &'static str = "No similar texts found";

    pub fn documents(&self) -> &[DocumentScore] {
        match self {
            Self::Similar(docs) => docs,
            Self::NoSimilarTexts => &[],
        }
    }
}

// ============ Verdict ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVerdict {
    pub filename: String,
    pub semantic_similarity: f64,
    pub lexical_similarity: f64,
    pub match_count: usize,
    pub inversion_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_type: Option<EditType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismVerdict {
    /// Documents that passed the semantic gate, keyed by filename.
    pub per_document: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_type: Option<EditType>,
    pub plagiarized: bool,
    /// Details for the gated documents, in corpus order.
    #[serde(default)]
    pub documents: Vec<DocumentVerdict>,
    pub lexical: LexicalReport,
}

impl PlagiarismVerdict {
    pub fn not_plagiarized(lexical: LexicalReport) -> Self {
        Self {
            per_document: BTreeMap::new(),
            edit_type: None,
            plagiarized: false,
            documents: Vec::new(),
            lexical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_type_labels() {
        assert_eq!(EditType::VoiceChange.to_string(), "Voice change");
        assert_eq!(EditType::Modification.label(), "Sentence modification");
    }

    #[test]
    fn test_lexical_report_serialization() {
        let report = LexicalReport::NoSimilarTexts;
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"status":"noSimilarTexts"}"#);
        assert!(report.documents().is_empty());
    }

    #[test]
    fn test_not_plagiarized_verdict_has_no_type() {
        let verdict = PlagiarismVerdict::not_plagiarized(LexicalReport::NoSimilarTexts);
        assert!(!verdict.plagiarized);
        assert!(verdict.per_document.is_empty());
        assert!(verdict.edit_type.is_none());
    }
}
