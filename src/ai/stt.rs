use serde::Deserialize;

use super::openai::{status_error, OpenAIGateway};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Container format of a recorded clip, as far as the transcription
/// endpoint cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Webm,
    Ogg,
    Mp3,
    M4a,
}

impl AudioFormat {
    /// Sniff the container from magic bytes. Unknown input is assumed to be
    /// webm, which is what the recorder produces.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => AudioFormat::Wav,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => AudioFormat::Webm,
            [b'O', b'g', b'g', b'S', ..] => AudioFormat::Ogg,
            [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] | [0xFF, 0xF2, ..] => {
                AudioFormat::Mp3
            }
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => AudioFormat::M4a,
            _ => AudioFormat::Webm,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio.wav",
            AudioFormat::Webm => "audio.webm",
            AudioFormat::Ogg => "audio.ogg",
            AudioFormat::Mp3 => "audio.mp3",
            AudioFormat::M4a => "audio.m4a",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
        }
    }
}

/// Transcribe audio using the OpenAI Whisper API
pub async fn transcribe_with_openai(gateway: &OpenAIGateway, audio: &[u8]) -> Result<String> {
    let config = gateway.config();
    let format = AudioFormat::detect(audio);

    let part = reqwest::multipart::Part::bytes(audio.to_vec())
        .file_name(format.file_name())
        .mime_str(format.mime())
        .map_err(|e| Error::Config(format!("MIME error: {}", e)))?;

    let mut form = reqwest::multipart::Form::new()
        .text("model", config.transcription_model.clone())
        .text("response_format", "json");
    if let Some(language) = &config.transcription_language {
        form = form.text("language", language.clone());
    }
    let form = form.part("file", part);

    let response = gateway
        .client()
        .post(gateway.endpoint("audio/transcriptions"))
        .header("Authorization", format!("Bearer {}", config.openai_api_key))
        .multipart(form)
        .send()
        .await
        .map_err(|e| Error::Network(format!("Whisper API request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, body));
    }

    let result: WhisperResponse = response
        .json()
        .await
        .map_err(|e| Error::Network(format!("Failed to parse Whisper response: {}", e)))?;

    log::info!("Transcribed {} bytes of {:?} audio", audio.len(), format);
    Ok(result.text)
}
