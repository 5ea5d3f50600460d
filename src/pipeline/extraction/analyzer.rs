//! Vision letter analyzer: one image in, structured letter fields out.
//!
//! The model is asked for a JSON object; whatever comes back goes through
//! [`parse_or_fallback`], so a chatty or malformed answer still yields the
//! raw text instead of an error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;

use super::parser::parse_or_fallback;
use super::types::{LetterAnalyzer, VisionClient};
use super::ExtractionError;
use crate::models::LetterAnalysis;
use crate::pipeline::ollama::OllamaError;

const SYSTEM_PROMPT: &str = "\
You read photographed or scanned letters. Extract the letter header and the \
complete body text exactly as written, in the original language. Never invent \
values that are not visible on the page.";

const USER_PROMPT: &str = "\
Analyze this letter. Answer with a single JSON object and nothing else, using \
exactly these keys: \"documentType\" (kind of letter, e.g. invoice, tax assessment), \
\"sender\", \"recipient\", \"date\", \"subject\", \"fullText\" (the complete text). \
Use \"Not detected\" for any header value you cannot find.";

/// Production analyzer backed by any [`VisionClient`].
pub struct VisionLetterAnalyzer {
    client: Arc<dyn VisionClient>,
    model: String,
}

impl VisionLetterAnalyzer {
    pub fn new(client: Arc<dyn VisionClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LetterAnalyzer for VisionLetterAnalyzer {
    async fn analyze(
        &self,
        image: &str,
        mime_type: &str,
    ) -> Result<LetterAnalysis, ExtractionError> {
        if !mime_type.starts_with("image/") {
            return Err(ExtractionError::UnsupportedMime(mime_type.to_string()));
        }
        let payload = normalize_payload(image)?;

        let start = std::time::Instant::now();
        let raw = self
            .client
            .chat_with_images(&self.model, USER_PROMPT, &[payload], Some(SYSTEM_PROMPT))
            .await?;

        if raw.trim().is_empty() {
            tracing::warn!(model = %self.model, "Vision model reply contained no readable text");
            return Err(ExtractionError::EmptyResponse);
        }

        let analysis = parse_or_fallback(&raw);
        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = analysis.full_text.len(),
            "Letter analysis complete"
        );
        Ok(analysis)
    }
}

/// Strip an optional `data:<mime>;base64,` prefix and check the rest decodes.
/// Ollama expects bare base64 in the `images` array.
pub fn normalize_payload(image: &str) -> Result<String, ExtractionError> {
    let trimmed = image.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((_, data)) => data,
            None => {
                return Err(ExtractionError::InvalidPayload(
                    "data URL is not base64-encoded".into(),
                ))
            }
        },
        None => trimmed,
    };

    if payload.is_empty() {
        return Err(ExtractionError::InvalidPayload("empty image payload".into()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ExtractionError::InvalidPayload(e.to_string()))?;

    Ok(payload.to_string())
}

/// Encode raw bytes as a data URL for the analyzer.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}

// ──────────────────────────────────────────────
// MockVisionClient (testing)
// ──────────────────────────────────────────────

enum MockOutcome {
    Reply(String),
    Timeout(u64),
    Unreachable,
}

/// Mock vision client returning a fixed reply or a fixed failure.
/// Counts calls so callers can assert the model was (not) reached.
pub struct MockVisionClient {
    outcome: MockOutcome,
    calls: AtomicUsize,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            outcome: MockOutcome::Reply(response.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn timing_out(secs: u64) -> Self {
        Self {
            outcome: MockOutcome::Timeout(secs),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            outcome: MockOutcome::Unreachable,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClient for MockVisionClient {
    async fn chat_with_images(
        &self,
        _model: &str,
        _user_prompt: &str,
        _images: &[String],
        _system: Option<&str>,
    ) -> Result<String, OllamaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            MockOutcome::Reply(text) => Ok(text.clone()),
            MockOutcome::Timeout(secs) => Err(OllamaError::Timeout(*secs)),
            MockOutcome::Unreachable => {
                Err(OllamaError::NotReachable("http://mock".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_DETECTED;

    const PNG_B64: &str = "iVBORw0KGgo=";

    fn analyzer(client: MockVisionClient) -> (Arc<MockVisionClient>, VisionLetterAnalyzer) {
        let client = Arc::new(client);
        let analyzer = VisionLetterAnalyzer::new(client.clone(), "llava:13b");
        (client, analyzer)
    }

    #[tokio::test]
    async fn structured_reply_is_parsed() {
        let reply = r#"{"documentType":"Tax assessment","sender":"Finanzamt Berlin","recipient":"J. Doe","date":"2024-03-01","subject":"Steuerbescheid","fullText":"Bescheid über Einkommensteuer"}"#;
        let (client, analyzer) = analyzer(MockVisionClient::new(reply));

        let analysis = analyzer
            .analyze(&format!("data:image/png;base64,{PNG_B64}"), "image/png")
            .await
            .unwrap();
        assert_eq!(analysis.sender, "Finanzamt Berlin");
        assert_eq!(analysis.subject, "Steuerbescheid");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn prose_reply_becomes_full_text() {
        let reply = "The letter is from the tax office and asks for payment.";
        let (_, analyzer) = analyzer(MockVisionClient::new(reply));

        let analysis = analyzer.analyze(PNG_B64, "image/png").await.unwrap();
        assert_eq!(analysis.full_text, reply);
        assert_eq!(analysis.sender, NOT_DETECTED);
    }

    #[tokio::test]
    async fn upstream_timeout_is_an_error() {
        let (_, analyzer) = analyzer(MockVisionClient::timing_out(300));
        let err = analyzer.analyze(PNG_B64, "image/jpeg").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Upstream(OllamaError::Timeout(300))
        ));
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let (_, analyzer) = analyzer(MockVisionClient::new("   \n"));
        let err = analyzer.analyze(PNG_B64, "image/png").await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyResponse));
        assert_eq!(err.to_string(), "Vision model returned no readable text");
    }

    #[tokio::test]
    async fn non_image_rejected_before_model_call() {
        let (client, analyzer) = analyzer(MockVisionClient::new("{}"));
        let err = analyzer.analyze(PNG_B64, "application/pdf").await.unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedMime(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_base64_rejected_before_model_call() {
        let (client, analyzer) = analyzer(MockVisionClient::new("{}"));
        let err = analyzer.analyze("not base64!!", "image/png").await.unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidPayload(_)));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn normalize_strips_data_url_prefix() {
        let payload = normalize_payload(&format!("data:image/webp;base64,{PNG_B64}")).unwrap();
        assert_eq!(payload, PNG_B64);
        assert_eq!(normalize_payload(PNG_B64).unwrap(), PNG_B64);
    }

    #[test]
    fn normalize_rejects_non_base64_data_url() {
        assert!(normalize_payload("data:image/png,rawbytes").is_err());
        assert!(normalize_payload("data:image/png;base64,").is_err());
    }

    #[test]
    fn data_url_round_trips_through_normalize() {
        let url = to_data_url("image/jpeg", b"\xFF\xD8\xFF\xE0jpeg");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(normalize_payload(&url).is_ok());
    }
}
