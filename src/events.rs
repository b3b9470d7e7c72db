use serde::Serialize;
use tokio::sync::mpsc;

use crate::problem::{ProblemInfo, RefinedResult, Solution};

/// Fire-and-forget notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ProcessingEvent {
    InitialStart,
    NoScreenshots,
    ProblemExtracted(ProblemInfo),
    SolutionSuccess(Solution),
    SolutionError(String),
    DebugStart,
    DebugSuccess(RefinedResult),
    DebugError(String),
    Unauthorized(String),
    ResetView,
}

impl ProcessingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingEvent::InitialStart => "initial-start",
            ProcessingEvent::NoScreenshots => "no-screenshots",
            ProcessingEvent::ProblemExtracted(_) => "problem-extracted",
            ProcessingEvent::SolutionSuccess(_) => "solution-success",
            ProcessingEvent::SolutionError(_) => "solution-error",
            ProcessingEvent::DebugStart => "debug-start",
            ProcessingEvent::DebugSuccess(_) => "debug-success",
            ProcessingEvent::DebugError(_) => "debug-error",
            ProcessingEvent::Unauthorized(_) => "unauthorized",
            ProcessingEvent::ResetView => "reset-view",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn emit(&self, event: ProcessingEvent);
}

/// Forwards events over an unbounded channel. A dropped receiver is not an
/// error; events are simply discarded.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<ProcessingEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProcessingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn emit(&self, event: ProcessingEvent) {
        log::debug!("Emitting {}", event.name());
        let _ = self.tx.send(event);
    }
}
