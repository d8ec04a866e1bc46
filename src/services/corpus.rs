// Corpus Loader
// Reads every *.txt file of the corpus directory once per session.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::CorpusDocument;
use crate::services::errors::{DetectionError, DetectionResult};
use crate::services::linguistic::LinguisticAnalyzer;
use crate::services::text_processor::Preprocessor;

fn unavailable(path: &Path, reason: impl Into<String>) -> DetectionError {
    DetectionError::CorpusUnavailable {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Corpus text files sorted by filename. Non-`.txt` entries are ignored.
pub fn list_corpus_files(dir: &Path) -> DetectionResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| unavailable(dir, e.to_string()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().map_or(false, |ext| ext == "txt"))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if files.is_empty() {
        return Err(unavailable(dir, "no .txt documents found"));
    }
    Ok(files)
}

/// Load and preprocess the whole corpus. Files that cannot be read as UTF-8
/// are skipped with a warning; an empty result is fatal.
pub async fn load_corpus<A: LinguisticAnalyzer>(
    dir: &Path,
    preprocessor: &Preprocessor<A>,
) -> DetectionResult<Vec<CorpusDocument>> {
    let files = list_corpus_files(dir)?;
    let mut documents = Vec::with_capacity(files.len());

    for path in files {
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let raw_text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("[CORPUS] Skipping {}: {}", filename, e);
                continue;
            }
        };
        documents.push(preprocessor.document(&filename, raw_text).await?);
    }

    if documents.is_empty() {
        return Err(unavailable(dir, "no readable documents"));
    }

    info!(
        "[CORPUS] Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::linguistic::RuleBasedAnalyzer;
    use std::sync::Arc;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("textmatch-corpus-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn preprocessor() -> Preprocessor<RuleBasedAnalyzer> {
        Preprocessor::new(Arc::new(RuleBasedAnalyzer::new()))
    }

    #[tokio::test]
    async fn test_load_corpus_sorted_txt_only() {
        let dir = scratch_dir();
        fs::write(dir.join("b.txt"), "Birds fly south. They return in spring.").unwrap();
        fs::write(dir.join("a.txt"), "Cats sleep all day.").unwrap();
        fs::write(dir.join("notes.md"), "ignored").unwrap();

        let docs = load_corpus(&dir, &preprocessor()).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(docs[1].sentences.len(), 2);
        assert_eq!(docs[0].tokens, vec!["cat", "sleep", "day"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = std::env::temp_dir().join(format!("textmatch-missing-{}", uuid::Uuid::new_v4()));
        let err = load_corpus(&dir, &preprocessor()).await.unwrap_err();
        assert!(matches!(err, DetectionError::CorpusUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_directory_without_txt_is_unavailable() {
        let dir = scratch_dir();
        fs::write(dir.join("readme.md"), "nothing here").unwrap();
        let err = load_corpus(&dir, &preprocessor()).await.unwrap_err();
        assert!(matches!(err, DetectionError::CorpusUnavailable { .. }));
        let _ = fs::remove_dir_all(&dir);
    }
}
