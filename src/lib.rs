pub mod ai;
pub mod capture;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod pipeline;
pub mod problem;
pub mod session;

pub use ai::CompletionGateway;
pub use capture::{EvidenceSource, Screenshot, ScreenshotQueue};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use events::{ChannelNotifier, Notifier, ProcessingEvent};
pub use orchestrator::Orchestrator;
pub use problem::{ProblemInfo, RefinedResult, Solution};
pub use session::{SessionKind, View};
