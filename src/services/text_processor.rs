// Text Processing Service
// Canonical token stream shared by the lexical and semantic stages:
// lowercase, strip digits and punctuation, drop stop-words, lemmatize.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::models::{CorpusDocument, Submission};
use crate::services::errors::DetectionResult;
use crate::services::linguistic::LinguisticAnalyzer;

/// NLTK English stop-word list.
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digit pattern is valid"))
}

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("non-word pattern is valid"))
}

pub fn is_stop_word(word: &str) -> bool {
    stop_words().contains(word)
}

/// Lowercase, delete digit runs, collapse every non-word run to one space.
/// Applying it twice gives the same result as applying it once.
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_digits = digits_re().replace_all(&lowered, "");
    non_word_re().replace_all(&without_digits, " ").into_owned()
}

pub fn tokenize(cleaned: &str) -> Vec<String> {
    cleaned.split_whitespace().map(str::to_string).collect()
}

pub fn remove_stopwords(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !is_stop_word(t))
        .cloned()
        .collect()
}

/// Runs the cleaning pipeline and the analyzer-backed stages over raw text.
pub struct Preprocessor<A: LinguisticAnalyzer> {
    analyzer: Arc<A>,
}

impl<A: LinguisticAnalyzer> Clone for Preprocessor<A> {
    fn clone(&self) -> Self {
        Self {
            analyzer: Arc::clone(&self.analyzer),
        }
    }
}

impl<A: LinguisticAnalyzer> Preprocessor<A> {
    pub fn new(analyzer: Arc<A>) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &Arc<A> {
        &self.analyzer
    }

    /// Base form of every token. Empty lemmas are dropped.
    pub async fn lemmatize_tokens(&self, tokens: &[String]) -> DetectionResult<Vec<String>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let lemmas = self.analyzer.lemmatize(tokens).await?;
        Ok(lemmas
            .into_iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Canonical string plus the token list it was joined from.
    pub async fn preprocess_text(&self, text: &str) -> DetectionResult<(String, Vec<String>)> {
        let cleaned = clean_text(text);
        let tokens = remove_stopwords(&tokenize(&cleaned));
        let lemmas = self.lemmatize_tokens(&tokens).await?;
        Ok((lemmas.join(" "), lemmas))
    }

    pub async fn split_into_sentences(&self, text: &str) -> DetectionResult<Vec<String>> {
        Ok(self.analyzer.split_sentences(text).await?)
    }

    pub async fn document(&self, id: &str, raw_text: String) -> DetectionResult<CorpusDocument> {
        let (_, tokens) = self.preprocess_text(&raw_text).await?;
        let sentences = self.split_into_sentences(&raw_text).await?;
        Ok(CorpusDocument {
            id: id.to_string(),
            raw_text,
            tokens,
            sentences,
        })
    }

    pub async fn submission(&self, raw_text: &str) -> DetectionResult<Submission> {
        let (_, tokens) = self.preprocess_text(raw_text).await?;
        let sentences = self.split_into_sentences(raw_text).await?;
        Ok(Submission {
            raw_text: raw_text.to_string(),
            tokens,
            sentences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::linguistic::RuleBasedAnalyzer;

    fn preprocessor() -> Preprocessor<RuleBasedAnalyzer> {
        Preprocessor::new(Arc::new(RuleBasedAnalyzer::new()))
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello, World! 123"), "hello world ");
        assert_eq!(clean_text("test!@#$%^&*()+"), "test ");
        assert_eq!(clean_text("123test"), "test");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        let samples = ["The Cat, sat 42 times!!", "  spaced   out\n\ttext ", "naïve café"];
        for s in samples {
            let once = clean_text(s);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn test_remove_stopwords() {
        let tokens = tokenize("this is a test of the system");
        assert_eq!(remove_stopwords(&tokens), vec!["test", "system"]);
    }

    #[tokio::test]
    async fn test_preprocess_text() {
        let (canonical, tokens) = preprocessor()
            .preprocess_text("The cats were running quickly!")
            .await
            .unwrap();
        assert_eq!(tokens, vec!["cat", "run", "quickly"]);
        assert_eq!(canonical, "cat run quickly");
    }

    #[tokio::test]
    async fn test_preprocess_empty_and_stopword_only_text() {
        let pre = preprocessor();
        let (canonical, tokens) = pre.preprocess_text("").await.unwrap();
        assert!(canonical.is_empty() && tokens.is_empty());
        let (_, tokens) = pre.preprocess_text("the and of 123").await.unwrap();
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn test_submission_keeps_sentences_and_tokens() {
        let submission = preprocessor()
            .submission("The dog barked. The cat ran away.")
            .await
            .unwrap();
        assert_eq!(submission.sentences, vec!["The dog barked.", "The cat ran away."]);
        assert!(submission.tokens.contains(&"dog".to_string()));
        assert!(!submission.is_empty());
    }
}
