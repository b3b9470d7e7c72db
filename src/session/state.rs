use serde::Serialize;

use crate::problem::{ProblemInfo, RefinedResult, Solution};

/// Which screen the presentation layer should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Queue,
    Solutions,
}

/// Results shared between the pipelines and the presentation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppState {
    pub view: View,
    pub problem_info: Option<ProblemInfo>,
    pub solution: Option<Solution>,
    pub refined: Option<RefinedResult>,
    pub has_debugged: bool,
}

impl AppState {
    /// Back to the initial view with nothing extracted.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
