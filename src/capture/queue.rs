use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{EvidenceSource, Screenshot};
use crate::error::{Error, Result};

/// File-backed screenshot queues.
///
/// Paths are recorded as captures happen; bytes are only read when a
/// pipeline asks for them.
#[derive(Debug, Default)]
pub struct ScreenshotQueue {
    primary: Mutex<Vec<PathBuf>>,
    extra: Mutex<Vec<PathBuf>>,
}

impl ScreenshotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, path: impl Into<PathBuf>) {
        self.primary.lock().push(path.into());
    }

    pub fn enqueue_extra(&self, path: impl Into<PathBuf>) {
        self.extra.lock().push(path.into());
    }

    pub fn len(&self) -> usize {
        self.primary.lock().len()
    }

    pub fn extra_len(&self) -> usize {
        self.extra.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn read_all(paths: Vec<PathBuf>) -> Result<Vec<Screenshot>> {
    try_join_all(paths.into_iter().map(|path| async move {
        let bytes = tokio::fs::read(&path).await?;
        Ok::<_, Error>(Screenshot { path, bytes })
    }))
    .await
}

#[async_trait]
impl EvidenceSource for ScreenshotQueue {
    async fn queued_screenshots(&self) -> Result<Vec<Screenshot>> {
        // Snapshot the paths so the lock is released before any I/O
        let paths = self.primary.lock().clone();
        read_all(paths).await
    }

    async fn extra_queued_screenshots(&self) -> Result<Vec<Screenshot>> {
        let paths = self.extra.lock().clone();
        read_all(paths).await
    }

    async fn audio_file(&self, path: &Path) -> Result<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("Audio file not found: {}", path.display()),
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_queues(&self) {
        self.primary.lock().clear();
        self.extra.lock().clear();
        log::debug!("Screenshot queues cleared");
    }
}
