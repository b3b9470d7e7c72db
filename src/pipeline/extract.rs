use tokio_util::sync::CancellationToken;

use super::{
    cancellable, EXTRACTION_MAX_TOKENS, TRANSCRIPT_ANALYSIS_MAX_TOKENS,
    TRANSCRIPT_EXTRACTION_MAX_TOKENS,
};
use crate::ai::{prompts, CompletionGateway, ContentPart};
use crate::capture::Screenshot;
use crate::decode::decode;
use crate::error::{Error, Result};
use crate::problem::ProblemInfo;

/// Classify screenshots into a [`ProblemInfo`] with one vision call.
///
/// Decode failures are fatal here: without a problem there is nothing to
/// solve.
pub async fn extract_from_screenshots(
    gateway: &dyn CompletionGateway,
    screenshots: &[Screenshot],
    token: &CancellationToken,
) -> Result<ProblemInfo> {
    if screenshots.is_empty() {
        return Err(Error::Precondition("No screenshots to process".to_string()));
    }

    let mut parts = Vec::with_capacity(screenshots.len() + 1);
    parts.push(ContentPart::Text(prompts::EXTRACT_SCREENSHOTS_USER));
    parts.extend(screenshots.iter().map(|s| ContentPart::Image(&s.bytes)));

    log::info!("Extracting problem from {} screenshot(s)", screenshots.len());
    let response = cancellable(
        token,
        gateway.complete_vision(
            prompts::EXTRACT_SCREENSHOTS_SYSTEM,
            &parts,
            EXTRACTION_MAX_TOKENS,
        ),
    )
    .await?;
    log::debug!("Extraction response: {} chars", response.len());

    let value = decode(&response)?;
    let problem = ProblemInfo::from_value(&value)?;
    log::info!("Extracted {}", problem.type_name());
    Ok(problem)
}

/// Transcribe, summarise, then restructure an interview recording.
///
/// Each stage feeds the next; the first failure aborts the whole chain.
pub async fn extract_from_audio(
    gateway: &dyn CompletionGateway,
    audio: &[u8],
    token: &CancellationToken,
) -> Result<ProblemInfo> {
    let transcript = cancellable(token, gateway.transcribe_audio(audio)).await?;
    if transcript.trim().is_empty() {
        return Err(Error::Validation(
            "Transcription returned no speech".to_string(),
        ));
    }
    log::info!("Transcript ready ({} chars)", transcript.len());

    let analysis = cancellable(
        token,
        gateway.complete_text(
            prompts::TRANSCRIPT_ANALYSIS_SYSTEM,
            &prompts::transcript_analysis_user(&transcript),
            TRANSCRIPT_ANALYSIS_MAX_TOKENS,
            false,
        ),
    )
    .await?;

    let structured = cancellable(
        token,
        gateway.complete_text(
            prompts::TRANSCRIPT_EXTRACTION_SYSTEM,
            &prompts::transcript_extraction_user(&analysis, &transcript),
            TRANSCRIPT_EXTRACTION_MAX_TOKENS,
            true,
        ),
    )
    .await?;

    let value = decode(&structured)?;
    let problem = ProblemInfo::from_value(&value)?;
    log::info!("Extracted {} from audio", problem.type_name());
    Ok(problem)
}
