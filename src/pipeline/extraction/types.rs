use async_trait::async_trait;

use super::ExtractionError;
use crate::models::LetterAnalysis;
use crate::pipeline::ollama::OllamaError;

/// Transport seam to a vision-capable chat model (allows mocking).
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn chat_with_images(
        &self,
        model: &str,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, OllamaError>;
}

/// `analyze(image, mime) -> structured letter fields`.
///
/// `image` is either a `data:<mime>;base64,...` URL or bare base64.
#[async_trait]
pub trait LetterAnalyzer: Send + Sync {
    async fn analyze(&self, image: &str, mime_type: &str)
        -> Result<LetterAnalysis, ExtractionError>;
}
