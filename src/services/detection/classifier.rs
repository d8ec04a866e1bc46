// Edit Classification
// Labels how aligned sentences were rewritten. Pronoun changes are read as a
// voice change, verb-form changes as a tense change.

use std::collections::HashMap;

use super::alignment::detect_reordering;
use crate::models::{DocumentClassification, EditType, SentenceMatch};
use crate::services::linguistic::{AnalyzerError, LinguisticAnalyzer, TokenAnnotation};

/// Fine-grained tags of the pronouns and of the verbs of one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SentenceFeatures {
    pub pronoun_tags: Vec<String>,
    pub verb_tags: Vec<String>,
}

impl SentenceFeatures {
    pub fn from_tokens(tokens: &[TokenAnnotation]) -> Self {
        Self {
            pronoun_tags: tokens.iter().filter(|t| t.is_pronoun()).map(|t| t.tag.clone()).collect(),
            verb_tags: tokens.iter().filter(|t| t.is_verb()).map(|t| t.tag.clone()).collect(),
        }
    }
}

/// Voice is checked before tense.
pub fn edit_type_for_features(corpus: &SentenceFeatures, submission: &SentenceFeatures) -> Option<EditType> {
    if corpus.pronoun_tags != submission.pronoun_tags {
        Some(EditType::VoiceChange)
    } else if corpus.verb_tags != submission.verb_tags {
        Some(EditType::TenseChange)
    } else {
        None
    }
}

/// Per-document cache so repeated sentences are annotated once.
struct FeatureCache<'a, A: LinguisticAnalyzer> {
    analyzer: &'a A,
    features: HashMap<String, SentenceFeatures>,
}

impl<'a, A: LinguisticAnalyzer> FeatureCache<'a, A> {
    fn new(analyzer: &'a A) -> Self {
        Self {
            analyzer,
            features: HashMap::new(),
        }
    }

    async fn get(&mut self, sentence: &str) -> Result<SentenceFeatures, AnalyzerError> {
        if let Some(features) = self.features.get(sentence) {
            return Ok(features.clone());
        }
        let tokens = self.analyzer.annotate(sentence).await?;
        let features = SentenceFeatures::from_tokens(&tokens);
        self.features.insert(sentence.to_string(), features.clone());
        Ok(features)
    }
}

/// Label for one aligned pair. Identical sentences carry no edit.
pub async fn classify_pair<A: LinguisticAnalyzer>(
    analyzer: &A,
    pair: &SentenceMatch,
) -> Result<Option<EditType>, AnalyzerError> {
    let mut cache = FeatureCache::new(analyzer);
    classify_with_cache(&mut cache, pair).await
}

async fn classify_with_cache<A: LinguisticAnalyzer>(
    cache: &mut FeatureCache<'_, A>,
    pair: &SentenceMatch,
) -> Result<Option<EditType>, AnalyzerError> {
    if pair.is_verbatim() {
        return Ok(None);
    }
    let corpus = cache.get(&pair.corpus_sentence).await?;
    let submission = cache.get(&pair.submission_sentence).await?;
    Ok(edit_type_for_features(&corpus, &submission))
}

/// Single label for a document's matches. The first pair with a voice or
/// tense difference decides; otherwise inversions mean reordering, and any
/// remaining non-identical pair means modification.
pub async fn classify_document<A: LinguisticAnalyzer>(
    analyzer: &A,
    matches: &[SentenceMatch],
) -> Result<DocumentClassification, AnalyzerError> {
    if matches.is_empty() {
        return Ok(DocumentClassification::unmatched());
    }

    let inversions = detect_reordering(matches);
    let mut cache = FeatureCache::new(analyzer);
    let mut edit_type = None;
    for pair in matches {
        if let Some(found) = classify_with_cache(&mut cache, pair).await? {
            edit_type = Some(found);
            break;
        }
    }

    let edit_type = edit_type.or_else(|| {
        if !inversions.is_empty() {
            Some(EditType::Reordering)
        } else if matches.iter().any(|m| !m.is_verbatim()) {
            Some(EditType::Modification)
        } else {
            None
        }
    });

    Ok(DocumentClassification {
        match_count: matches.len(),
        inversion_count: inversions.len(),
        edit_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::alignment::align;
    use crate::services::linguistic::RuleBasedAnalyzer;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn classify(corpus: &[&str], submission: &[&str]) -> DocumentClassification {
        let matches = align(&strings(corpus), &strings(submission), 0.7);
        classify_document(&RuleBasedAnalyzer::new(), &matches).await.unwrap()
    }

    fn features(pronouns: &[&str], verbs: &[&str]) -> SentenceFeatures {
        SentenceFeatures {
            pronoun_tags: strings(pronouns),
            verb_tags: strings(verbs),
        }
    }

    #[test]
    fn test_voice_takes_priority_over_tense() {
        let a = features(&["PRP"], &["VBD"]);
        let b = features(&[], &["VBZ"]);
        assert_eq!(edit_type_for_features(&a, &b), Some(EditType::VoiceChange));
        let c = features(&["PRP"], &["VBZ"]);
        assert_eq!(edit_type_for_features(&a, &c), Some(EditType::TenseChange));
        assert_eq!(edit_type_for_features(&a, &a), None);
    }

    #[tokio::test]
    async fn test_pronoun_difference_is_voice_change() {
        let result = classify(&["The cat sat on the mat."], &["The cat sat on the mat with it."]).await;
        assert_eq!(result.match_count, 1);
        assert_eq!(result.edit_type, Some(EditType::VoiceChange));
    }

    #[tokio::test]
    async fn test_verb_form_difference_is_tense_change() {
        let result = classify(
            &["The dog chased the ball across the yard."],
            &["The dog chases the ball across the yard."],
        )
        .await;
        assert_eq!(result.edit_type, Some(EditType::TenseChange));
    }

    #[tokio::test]
    async fn test_swapped_verbatim_sentences_are_reordering() {
        let result = classify(
            &["Rivers carry sediment to the sea.", "Mountains erode slowly over time."],
            &["Mountains erode slowly over time.", "Rivers carry sediment to the sea."],
        )
        .await;
        assert_eq!(result.inversion_count, 1);
        assert_eq!(result.edit_type, Some(EditType::Reordering));
    }

    #[tokio::test]
    async fn test_other_rewording_is_modification() {
        let result = classify(
            &["The quick brown fox jumps over the lazy dog."],
            &["The quick red fox jumps over the lazy dog."],
        )
        .await;
        assert_eq!(result.edit_type, Some(EditType::Modification));
    }

    #[tokio::test]
    async fn test_verbatim_in_order_copy_has_no_label() {
        let text = ["Water boils at sea level.", "Ice melts in warm rooms."];
        let result = classify(&text, &text).await;
        assert_eq!(result.match_count, 2);
        assert_eq!(result.edit_type, None);
    }

    #[tokio::test]
    async fn test_no_matches_is_unmatched() {
        let result = classify(&["Completely different words."], &["Nothing alike at all here!"]).await;
        assert!(!result.has_matches());
        assert_eq!(result.edit_type, None);
    }

    #[tokio::test]
    async fn test_verbatim_pair_is_not_classified() {
        let pair = SentenceMatch {
            corpus_index: 0,
            submission_index: 0,
            corpus_sentence: "Same.".to_string(),
            submission_sentence: "Same.".to_string(),
            similarity: 1.0,
        };
        let label = classify_pair(&RuleBasedAnalyzer::new(), &pair).await.unwrap();
        assert_eq!(label, None);
    }
}
