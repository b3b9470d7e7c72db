pub mod openai;
pub mod prompts;
pub mod stt;

use async_trait::async_trait;

use crate::error::Result;

/// One piece of a vision request, sent in order.
#[derive(Debug, Clone, Copy)]
pub enum ContentPart<'a> {
    Text(&'a str),
    /// PNG image bytes.
    Image(&'a [u8]),
}

/// The hosted model, reduced to the three call shapes the pipelines need.
///
/// Implementations make exactly one request per call and never retry.
/// Failures surface as `Error::Auth`, `Error::Network` or `Error::Upstream`.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<String>;

    async fn complete_vision(
        &self,
        system_prompt: &str,
        parts: &[ContentPart<'_>],
        max_tokens: u32,
    ) -> Result<String>;

    async fn transcribe_audio(&self, audio: &[u8]) -> Result<String>;
}
