// Lexical Similarity
// TF-IDF index over the canonical corpus strings, cosine scoring.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::models::{CorpusDocument, DocumentScore, LexicalReport};

fn term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("term pattern is valid"))
}

/// Terms of two or more word characters, lowercased.
fn terms(text: &str) -> Vec<String> {
    term_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Sparse row sorted by term index, l2-normalized.
type SparseRow = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct LexicalModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    filenames: Vec<String>,
    rows: Vec<SparseRow>,
}

impl LexicalModel {
    pub fn fit(corpus: &[CorpusDocument]) -> Self {
        let documents: Vec<(String, String)> = corpus
            .iter()
            .map(|d| (d.id.clone(), d.canonical()))
            .collect();
        Self::fit_texts(&documents)
    }

    /// Fit on `(filename, canonical text)` pairs.
    pub fn fit_texts(documents: &[(String, String)]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|(_, text)| terms(text)).collect();

        // Document frequency per term; BTreeMap keeps term indices alphabetical.
        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        for doc_terms in &tokenized {
            let mut seen: Vec<&str> = doc_terms.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f64;
        let mut vocabulary = HashMap::with_capacity(df.len());
        let mut idf = Vec::with_capacity(df.len());
        for (index, (term, count)) in df.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n) / (1.0 + count as f64)).ln() + 1.0);
        }

        let mut model = Self {
            vocabulary,
            idf,
            filenames: documents.iter().map(|(name, _)| name.clone()).collect(),
            rows: Vec::with_capacity(documents.len()),
        };
        let rows = tokenized.iter().map(|t| model.weigh(t)).collect();
        model.rows = rows;
        model
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Terms outside the fitted vocabulary carry no weight.
    fn weigh(&self, doc_terms: &[String]) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in doc_terms {
            if let Some(&index) = self.vocabulary.get(term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() {
                *w /= norm;
            }
        }
        row
    }

    /// Cosine similarity of `canonical_query` to every corpus document, corpus order.
    pub fn score(&self, canonical_query: &str) -> Vec<DocumentScore> {
        let query = self.weigh(&terms(canonical_query));
        self.filenames
            .iter()
            .zip(&self.rows)
            .map(|(filename, row)| DocumentScore {
                filename: filename.clone(),
                similarity: sparse_dot(&query, row).clamp(0.0, 1.0),
            })
            .collect()
    }

    /// Documents scoring strictly above `threshold`.
    pub fn check(&self, canonical_query: &str, threshold: f64) -> LexicalReport {
        check_scores(self.score(canonical_query), threshold)
    }
}

pub fn check_scores(scores: Vec<DocumentScore>, threshold: f64) -> LexicalReport {
    let similar: Vec<DocumentScore> = scores
        .into_iter()
        .filter(|s| s.similarity > threshold)
        .collect();
    if similar.is_empty() {
        LexicalReport::NoSimilarTexts
    } else {
        LexicalReport::Similar(similar)
    }
}

fn sparse_dot(a: &SparseRow, b: &SparseRow) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LexicalModel {
        LexicalModel::fit_texts(&[
            ("a.txt".to_string(), "cat sit mat".to_string()),
            ("b.txt".to_string(), "dog run park".to_string()),
        ])
    }

    #[test]
    fn test_identical_text_scores_one() {
        let scores = model().score("cat sit mat");
        assert!((scores[0].similarity - 1.0).abs() < 1e-9);
        assert_eq!(scores[1].similarity, 0.0);
    }

    #[test]
    fn test_disjoint_vocabulary_reports_no_similar_texts() {
        let report = model().check("quantum entanglement theory", 0.3);
        assert_eq!(report, LexicalReport::NoSimilarTexts);
        assert!(report.documents().is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let scores = vec![DocumentScore {
            filename: "a.txt".to_string(),
            similarity: 0.3,
        }];
        assert_eq!(check_scores(scores, 0.3), LexicalReport::NoSimilarTexts);
    }

    #[test]
    fn test_partial_overlap_is_between_zero_and_one() {
        let m = model();
        let scores = m.score("cat sit park");
        assert!(scores[0].similarity > 0.5 && scores[0].similarity < 1.0);
        assert!(scores[1].similarity > 0.0 && scores[1].similarity < 0.5);
        match m.check("cat sit park", 0.4) {
            LexicalReport::Similar(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].filename, "a.txt");
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn test_single_character_terms_are_ignored() {
        let m = model();
        assert_eq!(m.vocabulary_size(), 6);
        assert!(m.score("x y z").iter().all(|s| s.similarity == 0.0));
    }
}
