// Word Embedding Model
// Skip-gram with negative sampling over the corpus token lists, plus the
// binary artifact format used to persist it between sessions.

use std::collections::HashMap;
use std::path::Path;

use crate::services::config_store::EmbeddingConfig;
use crate::services::errors::{DetectionError, DetectionResult};

const MAGIC: &[u8; 8] = b"TMW2V001";
const MAX_EXP: f32 = 6.0;
const MIN_ALPHA_FRACTION: f32 = 0.0001;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingModel {
    dimensions: usize,
    words: Vec<String>,
    index: HashMap<String, usize>,
    /// Row-major `words.len() * dimensions`.
    vectors: Vec<f32>,
}

impl EmbeddingModel {
    pub fn from_vectors(dimensions: usize, entries: Vec<(String, Vec<f32>)>) -> DetectionResult<Self> {
        let mut words = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len() * dimensions);
        for (word, vector) in entries {
            if vector.len() != dimensions {
                return Err(DetectionError::ModelUnavailable(format!(
                    "vector for '{}' has {} dimensions, expected {}",
                    word,
                    vector.len(),
                    dimensions
                )));
            }
            words.push(word);
            vectors.extend_from_slice(&vector);
        }
        Ok(Self::assemble(dimensions, words, vectors))
    }

    fn assemble(dimensions: usize, words: Vec<String>, vectors: Vec<f32>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self {
            dimensions,
            words,
            index,
            vectors,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        let row = *self.index.get(word)?;
        let start = row * self.dimensions;
        Some(&self.vectors[start..start + self.dimensions])
    }

    /// Mean of the known token vectors; all-zero when none are known.
    pub fn mean_vector(&self, tokens: &[String]) -> Vec<f32> {
        let mut sum = vec![0.0_f32; self.dimensions];
        let mut known = 0usize;
        for token in tokens {
            if let Some(vector) = self.get(token) {
                for (acc, value) in sum.iter_mut().zip(vector) {
                    *acc += value;
                }
                known += 1;
            }
        }
        if known > 0 {
            let scale = known as f32;
            for value in sum.iter_mut() {
                *value /= scale;
            }
        }
        sum
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload: usize = self.words.iter().map(|w| 4 + w.len()).sum();
        let mut out = Vec::with_capacity(16 + payload + self.vectors.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dimensions as u32).to_le_bytes());
        out.extend_from_slice(&(self.words.len() as u32).to_le_bytes());
        for (row, word) in self.words.iter().enumerate() {
            out.extend_from_slice(&(word.len() as u32).to_le_bytes());
            out.extend_from_slice(word.as_bytes());
            let start = row * self.dimensions;
            for value in &self.vectors[start..start + self.dimensions] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> DetectionResult<Self> {
        let mut reader = ByteReader { bytes, pos: 0 };
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(corrupt("bad magic header"));
        }
        let dimensions = reader.read_u32()? as usize;
        let count = reader.read_u32()? as usize;
        if dimensions == 0 {
            return Err(corrupt("zero dimensions"));
        }

        // Every row needs at least a length prefix and its vector.
        let row_bytes = dimensions
            .checked_mul(4)
            .and_then(|v| v.checked_add(4))
            .ok_or_else(|| corrupt("dimensions overflow"))?;
        let remaining = bytes.len() - reader.pos;
        if count.checked_mul(row_bytes).map_or(true, |needed| needed > remaining) {
            return Err(corrupt("truncated"));
        }

        let mut words = Vec::with_capacity(count);
        let mut vectors = Vec::with_capacity(count * dimensions);
        for _ in 0..count {
            let len = reader.read_u32()? as usize;
            let word = std::str::from_utf8(reader.take(len)?)
                .map_err(|_| corrupt("word is not valid UTF-8"))?
                .to_string();
            let raw = reader.take(dimensions * 4)?;
            vectors.extend(
                raw.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            );
            words.push(word);
        }
        if reader.pos != bytes.len() {
            return Err(corrupt("trailing bytes"));
        }
        Ok(Self::assemble(dimensions, words, vectors))
    }

    pub fn load(path: &Path) -> DetectionResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| DetectionError::ModelUnavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes)
    }
}

fn corrupt(reason: &str) -> DetectionError {
    DetectionError::ModelUnavailable(format!("corrupt model artifact: {}", reason))
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, len: usize) -> DetectionResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| corrupt("truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> DetectionResult<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}

/// xorshift64*; training must be reproducible for a fixed seed.
struct TrainingRng(u64);

impl TrainingRng {
    fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15 | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Words kept for training, most frequent first, ties alphabetical.
/// Falls back to `min_count = 1` rather than produce an empty vocabulary.
fn build_vocabulary(sentences: &[Vec<String>], min_count: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sentence in sentences {
        for word in sentence {
            *counts.entry(word.as_str()).or_insert(0) += 1;
        }
    }

    let select = |threshold: usize| {
        let mut vocab: Vec<(String, usize)> = counts
            .iter()
            .filter(|(_, c)| **c >= threshold)
            .map(|(w, c)| ((*w).to_string(), *c))
            .collect();
        vocab.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        vocab
    };

    let vocab = select(min_count.max(1));
    if vocab.is_empty() && min_count > 1 {
        select(1)
    } else {
        vocab
    }
}

/// Cumulative unigram^0.75 weights for negative sampling.
struct NegativeTable {
    cumulative: Vec<f64>,
}

impl NegativeTable {
    fn new(vocab: &[(String, usize)]) -> Self {
        let mut total = 0.0;
        let cumulative = vocab
            .iter()
            .map(|(_, count)| {
                total += (*count as f64).powf(0.75);
                total
            })
            .collect();
        Self { cumulative }
    }

    fn sample(&self, rng: &mut TrainingRng) -> usize {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        let target = rng.next_f64() * total;
        self.cumulative
            .partition_point(|c| *c <= target)
            .min(self.cumulative.len().saturating_sub(1))
    }
}

fn sigmoid(x: f32) -> f32 {
    if x > MAX_EXP {
        1.0
    } else if x < -MAX_EXP {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

pub struct EmbeddingTrainer {
    config: EmbeddingConfig,
}

impl EmbeddingTrainer {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    /// Deterministic for identical inputs and configuration.
    pub fn train(&self, sentences: &[Vec<String>]) -> EmbeddingModel {
        let dims = self.config.dimensions.max(1);
        let vocab = build_vocabulary(sentences, self.config.min_count);
        if vocab.is_empty() {
            return EmbeddingModel::assemble(dims, Vec::new(), Vec::new());
        }

        let index: HashMap<&str, usize> = vocab
            .iter()
            .enumerate()
            .map(|(i, (w, _))| (w.as_str(), i))
            .collect();
        let corpus: Vec<Vec<usize>> = sentences
            .iter()
            .map(|s| s.iter().filter_map(|w| index.get(w.as_str()).copied()).collect())
            .collect();

        let mut rng = TrainingRng::new(self.config.seed);
        let mut input: Vec<f32> = (0..vocab.len() * dims)
            .map(|_| (rng.next_f64() as f32 - 0.5) / dims as f32)
            .collect();
        let mut output = vec![0.0_f32; vocab.len() * dims];
        let table = NegativeTable::new(&vocab);

        let epochs = self.config.epochs.max(1);
        let window = self.config.window.max(1);
        let total_steps = (corpus.iter().map(Vec::len).sum::<usize>() * epochs).max(1) as f32;
        let start_alpha = self.config.learning_rate;
        let mut step = 0usize;
        let mut grad = vec![0.0_f32; dims];

        for _ in 0..epochs {
            for sentence in &corpus {
                for (pos, &center) in sentence.iter().enumerate() {
                    let progress = step as f32 / total_steps;
                    let alpha = start_alpha * (1.0 - progress).max(MIN_ALPHA_FRACTION);
                    step += 1;

                    let lo = pos.saturating_sub(window);
                    let hi = (pos + window).min(sentence.len() - 1);
                    for ctx_pos in lo..=hi {
                        if ctx_pos == pos {
                            continue;
                        }
                        let context = sentence[ctx_pos];
                        grad.iter_mut().for_each(|g| *g = 0.0);
                        let center_row = center * dims;

                        for k in 0..=self.config.negative {
                            let (target, label) = if k == 0 {
                                (context, 1.0)
                            } else {
                                let sampled = table.sample(&mut rng);
                                if sampled == context {
                                    continue;
                                }
                                (sampled, 0.0)
                            };
                            let target_row = target * dims;

                            let dot: f32 = (0..dims)
                                .map(|d| input[center_row + d] * output[target_row + d])
                                .sum();
                            let g = (label - sigmoid(dot)) * alpha;
                            for d in 0..dims {
                                grad[d] += g * output[target_row + d];
                                output[target_row + d] += g * input[center_row + d];
                            }
                        }

                        for d in 0..dims {
                            input[center_row + d] += grad[d];
                        }
                    }
                }
            }
        }

        let words = vocab.into_iter().map(|(w, _)| w).collect();
        EmbeddingModel::assemble(dims, words, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(raw: &[&str]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    fn small_config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: 16,
            epochs: 5,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let corpus = sentences(&["cat sit mat cat", "dog run park dog", "cat dog play"]);
        let trainer = EmbeddingTrainer::new(small_config());
        assert_eq!(trainer.train(&corpus), trainer.train(&corpus));
    }

    #[test]
    fn test_vocabulary_respects_min_count_and_order() {
        let vocab = build_vocabulary(&sentences(&["b a a c", "b a"]), 2);
        assert_eq!(
            vocab,
            vec![("a".to_string(), 3), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn test_min_count_relaxes_for_tiny_corpus() {
        let model = EmbeddingTrainer::new(small_config()).train(&sentences(&["alpha beta gamma"]));
        assert_eq!(model.len(), 3);
        assert!(model.contains("beta"));
    }

    #[test]
    fn test_empty_corpus_gives_empty_model() {
        let model = EmbeddingTrainer::new(small_config()).train(&[]);
        assert!(model.is_empty());
        assert_eq!(model.mean_vector(&["x".to_string()]), vec![0.0; 16]);
    }

    #[test]
    fn test_mean_vector_skips_unknown_tokens() {
        let model = EmbeddingModel::from_vectors(
            2,
            vec![
                ("a".to_string(), vec![1.0, 0.0]),
                ("b".to_string(), vec![0.0, 3.0]),
            ],
        )
        .unwrap();
        let tokens = vec!["a".to_string(), "zzz".to_string(), "b".to_string()];
        assert_eq!(model.mean_vector(&tokens), vec![0.5, 1.5]);
    }

    #[test]
    fn test_artifact_bytes_reload() {
        let model = EmbeddingTrainer::new(small_config())
            .train(&sentences(&["cat sit mat cat sit", "dog run park"]));
        let restored = EmbeddingModel::from_bytes(&model.to_bytes()).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_corrupt_artifact_is_model_unavailable() {
        let err = EmbeddingModel::from_bytes(b"not a model").unwrap_err();
        assert!(matches!(err, DetectionError::ModelUnavailable(_)));

        let model = EmbeddingModel::from_vectors(2, vec![("a".to_string(), vec![1.0, 2.0])]).unwrap();
        let mut bytes = model.to_bytes();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            EmbeddingModel::from_bytes(&bytes),
            Err(DetectionError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_header_claiming_huge_sizes_is_rejected() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&(1u32 << 20).to_le_bytes());
        assert!(matches!(
            EmbeddingModel::from_bytes(&bytes),
            Err(DetectionError::ModelUnavailable(_))
        ));

        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            EmbeddingModel::from_bytes(&bytes),
            Err(DetectionError::ModelUnavailable(_))
        ));
    }
}
