// spaCy Analysis Service Client
// Calls the external spaCy service for sentence boundaries, lemmas and tags

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{AnalyzerError, LinguisticAnalyzer, TokenAnnotation};

/// Analysis service URL
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8788";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const LANGUAGE: &str = "en";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceResult {
    pub text: String,
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Debug, Serialize)]
struct LemmatizeRequest<'a> {
    tokens: &'a [String],
    language: &'a str,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    sentences: Vec<SentenceResult>,
}

#[derive(Debug, Deserialize)]
struct LemmatizeResponse {
    lemmas: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    tokens: Vec<TokenAnnotation>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

pub struct SpacyServiceClient {
    base_url: String,
    client: Client,
}

impl SpacyServiceClient {
    pub fn new(base_url: &str) -> Result<Self, AnalyzerError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers its health check
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<HealthResponse>().await {
                Ok(health) => health.status == "ok",
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, AnalyzerError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse(e.to_string()))
    }

    /// Sentences with offsets normalized to UTF-8 byte positions in `text`.
    pub async fn segment_sentences(&self, text: &str) -> Result<Vec<SentenceResult>, AnalyzerError> {
        let request = SegmentRequest {
            text,
            language: LANGUAGE,
        };
        let result: SegmentResponse = self.post_json("/segment", &request).await?;

        let mut sentences = Vec::with_capacity(result.sentences.len());
        for mut sent in result.sentences {
            let (start, end) = normalize_offsets_to_utf8_bytes(text, sent.start, sent.end)
                .ok_or_else(|| {
                    AnalyzerError::InvalidResponse(format!(
                        "invalid sentence offsets: start={} end={}",
                        sent.start, sent.end
                    ))
                })?;
            sent.start = start;
            sent.end = end;
            sent.text = slice_by_bytes(text, start, end);
            sentences.push(sent);
        }
        debug!("[ANALYZER] spaCy segmented {} sentences", sentences.len());
        Ok(sentences)
    }
}

impl LinguisticAnalyzer for SpacyServiceClient {
    async fn split_sentences(&self, text: &str) -> Result<Vec<String>, AnalyzerError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let sentences = self.segment_sentences(text).await?;
        Ok(sentences
            .into_iter()
            .map(|s| s.text.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    async fn lemmatize(&self, tokens: &[String]) -> Result<Vec<String>, AnalyzerError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let request = LemmatizeRequest {
            tokens,
            language: LANGUAGE,
        };
        let result: LemmatizeResponse = self.post_json("/lemmatize", &request).await?;
        if result.lemmas.len() != tokens.len() {
            return Err(AnalyzerError::InvalidResponse(format!(
                "expected {} lemmas, got {}",
                tokens.len(),
                result.lemmas.len()
            )));
        }
        Ok(result.lemmas)
    }

    async fn annotate(&self, sentence: &str) -> Result<Vec<TokenAnnotation>, AnalyzerError> {
        let request = AnnotateRequest {
            text: sentence,
            language: LANGUAGE,
        };
        let result: AnnotateResponse = self.post_json("/annotate", &request).await?;
        Ok(result.tokens)
    }
}

fn usize_to_i32(value: usize) -> Option<i32> {
    if value <= i32::MAX as usize {
        Some(value as i32)
    } else {
        None
    }
}

fn char_offset_to_utf8_byte_index(text: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }

    let mut current = 0usize;
    for (byte_idx, _) in text.char_indices() {
        if current == char_offset {
            return Some(byte_idx);
        }
        current += 1;
    }

    if current == char_offset {
        Some(text.len())
    } else {
        None
    }
}

/// spaCy reports character offsets; accept byte offsets when they already line up.
fn normalize_offsets_to_utf8_bytes(text: &str, start: i32, end: i32) -> Option<(i32, i32)> {
    if start < 0 || end < 0 || end < start {
        return None;
    }

    let start_u = start as usize;
    let end_u = end as usize;
    let len_bytes = text.len();

    if start_u <= len_bytes
        && end_u <= len_bytes
        && text.is_char_boundary(start_u)
        && text.is_char_boundary(end_u)
    {
        return Some((start, end));
    }

    let start_b = char_offset_to_utf8_byte_index(text, start_u)?;
    let end_b = char_offset_to_utf8_byte_index(text, end_u)?;
    Some((usize_to_i32(start_b)?, usize_to_i32(end_b)?))
}

fn slice_by_bytes(text: &str, start: i32, end: i32) -> String {
    if start < 0 || end <= start {
        return String::new();
    }
    let len = text.len();
    let mut s = (start as usize).min(len);
    let mut e = (end as usize).min(len);
    if s >= e {
        return String::new();
    }
    while s < e && !text.is_char_boundary(s) {
        s += 1;
    }
    while e > s && !text.is_char_boundary(e) {
        e -= 1;
    }
    text.get(s..e).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_base_url() {
        let client = SpacyServiceClient::new("http://localhost:8788/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8788");
    }

    #[test]
    fn test_char_offsets_are_converted_to_bytes() {
        let text = "日本. Next.";
        // Char offset 4 falls inside a multi-byte character when read as bytes.
        let (start, end) = normalize_offsets_to_utf8_bytes(text, 4, 9).unwrap();
        assert_eq!((start, end), (8, 13));
        assert_eq!(slice_by_bytes(text, start, end), "Next.");
    }

    #[test]
    fn test_invalid_offsets_are_rejected() {
        assert!(normalize_offsets_to_utf8_bytes("abc", 2, 1).is_none());
        assert!(normalize_offsets_to_utf8_bytes("abc", 0, 10).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_unavailable() {
        let client = SpacyServiceClient::with_timeout("http://127.0.0.1:1", 2).unwrap();
        assert!(!client.is_available().await);
        assert!(client.split_sentences("One. Two.").await.is_err());
    }
}
