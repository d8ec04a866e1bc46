// Sentence Alignment
// Character-level matching ratio between sentences, pairwise alignment of two
// documents and detection of order inversions among the aligned pairs.

use std::collections::HashMap;

use crate::models::{CrossingInversion, SentenceMatch};

/// Sequences at least this long get their most frequent characters marked
/// as popular and excluded from match seeding.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Ratcliff/Obershelp style matcher: repeatedly takes the longest common
/// block, then recurses on the unmatched sides.
pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    b2j: HashMap<char, Vec<usize>>,
}

impl SequenceMatcher {
    pub fn new(a: &str, b: &str) -> Self {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b2j }
    }

    /// Longest matching block inside `a[alo..ahi]` and `b[blo..bhi]`,
    /// earliest in `a` on ties, then earliest in `b`.
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0usize);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next_j2len: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j.checked_sub(1).and_then(|prev| j2len.get(&prev)).copied().unwrap_or(0) + 1;
                    next_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next_j2len;
        }

        // Popular characters never seed a block but may still extend one.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    /// Total number of characters in matching blocks.
    pub fn matching_characters(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    /// 2·M / T, where M is matched characters and T the combined length.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * self.matching_characters() as f64 / total as f64
    }
}

pub fn sentence_similarity(a: &str, b: &str) -> f64 {
    SequenceMatcher::new(a, b).ratio()
}

/// Every (corpus, submission) sentence pair whose ratio is strictly above
/// `threshold`, corpus-major order. Repeated sentence pairs are scored once.
pub fn align(corpus_sentences: &[String], submission_sentences: &[String], threshold: f64) -> Vec<SentenceMatch> {
    let mut memo: HashMap<(&str, &str), f64> = HashMap::new();
    let mut matches = Vec::new();

    for (i, corpus_sentence) in corpus_sentences.iter().enumerate() {
        for (j, submission_sentence) in submission_sentences.iter().enumerate() {
            let key = (corpus_sentence.as_str(), submission_sentence.as_str());
            let similarity = *memo
                .entry(key)
                .or_insert_with(|| sentence_similarity(key.0, key.1));
            if similarity > threshold {
                matches.push(SentenceMatch {
                    corpus_index: i,
                    submission_index: j,
                    corpus_sentence: corpus_sentence.clone(),
                    submission_sentence: submission_sentence.clone(),
                    similarity,
                });
            }
        }
    }
    matches
}

/// Adjacent matches that advance in the corpus but go back in the submission.
pub fn detect_reordering(matches: &[SentenceMatch]) -> Vec<CrossingInversion> {
    matches
        .windows(2)
        .filter(|pair| {
            pair[0].corpus_index < pair[1].corpus_index
                && pair[0].submission_index > pair[1].submission_index
        })
        .map(|pair| CrossingInversion {
            first: pair[0].clone(),
            second: pair[1].clone(),
        })
        .collect()
}
