pub mod queue;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use queue::ScreenshotQueue;

/// A captured screenshot: where it came from plus its PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Where the pipelines get their input from.
///
/// Screenshots come back in capture order. The primary queue feeds problem
/// extraction; the extra queue holds follow-up captures used when debugging.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn queued_screenshots(&self) -> Result<Vec<Screenshot>>;

    async fn extra_queued_screenshots(&self) -> Result<Vec<Screenshot>>;

    async fn audio_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn clear_queues(&self);
}
