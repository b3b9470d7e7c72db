pub mod manager;
pub mod state;

pub use manager::{RunOutcome, SessionKind, SessionManager, SessionStatus, SessionTicket};
pub use state::{AppState, View};
