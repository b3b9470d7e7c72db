use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The two independent pipeline kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Primary,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Handle given to a running pipeline. It identifies the run by generation
/// so a superseded run cannot finish or publish on behalf of its successor.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub kind: SessionKind,
    pub generation: u64,
    pub run_id: Uuid,
    pub token: CancellationToken,
}

impl SessionTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct ActiveRun {
    generation: u64,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    active: Option<ActiveRun>,
    last_outcome: Option<RunOutcome>,
}

impl Slot {
    fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        }
    }
}

/// At most one cancellation token per pipeline kind.
#[derive(Debug, Default)]
pub struct SessionManager {
    primary: Slot,
    debug: Slot,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: SessionKind) -> &Slot {
        match kind {
            SessionKind::Primary => &self.primary,
            SessionKind::Debug => &self.debug,
        }
    }

    fn slot_mut(&mut self, kind: SessionKind) -> &mut Slot {
        match kind {
            SessionKind::Primary => &mut self.primary,
            SessionKind::Debug => &mut self.debug,
        }
    }

    /// Start a run of `kind`, cancelling any run of the same kind first.
    pub fn begin(&mut self, kind: SessionKind) -> SessionTicket {
        let slot = self.slot_mut(kind);
        if let Some(prior) = &slot.active {
            log::info!(
                "Superseding {:?} run {} (generation {})",
                kind,
                prior.run_id,
                prior.generation
            );
        }
        slot.cancel();

        slot.generation += 1;
        let run = ActiveRun {
            generation: slot.generation,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            token: CancellationToken::new(),
        };
        let ticket = SessionTicket {
            kind,
            generation: run.generation,
            run_id: run.run_id,
            token: run.token.clone(),
        };
        log::debug!(
            "Started {:?} run {} at {}",
            kind,
            run.run_id,
            run.started_at.to_rfc3339()
        );
        slot.active = Some(run);
        ticket
    }

    /// Whether `ticket` still owns its slot.
    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.slot(ticket.kind)
            .active
            .as_ref()
            .map_or(false, |run| run.generation == ticket.generation)
    }

    /// Release the slot held by `ticket`. Returns false, and leaves the slot
    /// alone, when a newer run has taken it over.
    pub fn finish(&mut self, ticket: &SessionTicket, outcome: RunOutcome) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "Stale {:?} run {} finished as {:?}",
                ticket.kind,
                ticket.run_id,
                outcome
            );
            return false;
        }

        let slot = self.slot_mut(ticket.kind);
        if let Some(run) = slot.active.take() {
            let elapsed = Utc::now() - run.started_at;
            log::info!(
                "{:?} run {} {:?} after {} ms",
                ticket.kind,
                run.run_id,
                outcome,
                elapsed.num_milliseconds()
            );
        }
        slot.last_outcome = Some(outcome);
        true
    }

    /// Cancel the running session of `kind`, if any.
    pub fn cancel(&mut self, kind: SessionKind) -> bool {
        let slot = self.slot_mut(kind);
        let cancelled = slot.cancel();
        if cancelled {
            slot.last_outcome = Some(RunOutcome::Cancelled);
        }
        cancelled
    }

    pub fn cancel_all(&mut self) {
        self.cancel(SessionKind::Primary);
        self.cancel(SessionKind::Debug);
    }

    pub fn status(&self, kind: SessionKind) -> SessionStatus {
        if self.slot(kind).active.is_some() {
            SessionStatus::Running
        } else {
            SessionStatus::Idle
        }
    }

    pub fn last_outcome(&self, kind: SessionKind) -> Option<RunOutcome> {
        self.slot(kind).last_outcome
    }

    pub fn run_id(&self, kind: SessionKind) -> Option<Uuid> {
        self.slot(kind).active.as_ref().map(|run| run.run_id)
    }
}
