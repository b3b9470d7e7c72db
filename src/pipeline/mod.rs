//! The three processing stages. Each takes the gateway and a cancellation
//! token by reference and returns its result; publishing to shared state is
//! left to the orchestrator so a superseded run never writes anything.

pub mod debug;
pub mod extract;
pub mod solve;

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub const EXTRACTION_MAX_TOKENS: u32 = 4096;
pub const TRANSCRIPT_ANALYSIS_MAX_TOKENS: u32 = 1024;
pub const TRANSCRIPT_EXTRACTION_MAX_TOKENS: u32 = 1500;
pub const SOLUTION_MAX_TOKENS: u32 = 4096;
pub const DEBUG_MAX_TOKENS: u32 = 4096;

/// Await a gateway call unless `token` fires first.
///
/// On cancellation the call future is dropped, which aborts the request.
pub(crate) async fn cancellable<T, F>(token: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory gateway that replays a script of canned replies.

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    use crate::ai::{CompletionGateway, ContentPart};
    use crate::error::{Error, Result};

    pub enum Reply {
        Text(String),
        Fail(Error),
        /// Never resolves; only cancellation gets the caller out.
        Hang,
    }

    pub fn text(s: &str) -> Reply {
        Reply::Text(s.to_string())
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Text {
            system: String,
            user: String,
            max_tokens: u32,
            json_mode: bool,
        },
        Vision {
            system: String,
            texts: Vec<String>,
            images: Vec<Vec<u8>>,
        },
        Transcribe {
            bytes: usize,
        },
    }

    #[derive(Default)]
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Call>>,
        /// Signalled every time a call starts.
        pub entered: Notify,
    }

    impl ScriptedGateway {
        pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        async fn respond(&self, call: Call) -> Result<String> {
            self.calls.lock().push(call);
            let reply = self.replies.lock().pop_front();
            self.entered.notify_one();
            match reply {
                Some(Reply::Text(text)) => Ok(text),
                Some(Reply::Fail(e)) => Err(e),
                Some(Reply::Hang) => std::future::pending().await,
                None => Err(Error::Upstream {
                    status: 500,
                    message: "script exhausted".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl CompletionGateway for ScriptedGateway {
        async fn complete_text(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            max_tokens: u32,
            json_mode: bool,
        ) -> Result<String> {
            self.respond(Call::Text {
                system: system_prompt.to_string(),
                user: user_prompt.to_string(),
                max_tokens,
                json_mode,
            })
            .await
        }

        async fn complete_vision(
            &self,
            system_prompt: &str,
            parts: &[ContentPart<'_>],
            _max_tokens: u32,
        ) -> Result<String> {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for part in parts {
                match part {
                    ContentPart::Text(t) => texts.push(t.to_string()),
                    ContentPart::Image(bytes) => images.push(bytes.to_vec()),
                }
            }
            self.respond(Call::Vision {
                system: system_prompt.to_string(),
                texts,
                images,
            })
            .await
        }

        async fn transcribe_audio(&self, audio: &[u8]) -> Result<String> {
            self.respond(Call::Transcribe { bytes: audio.len() }).await
        }
    }
}
