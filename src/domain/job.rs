//! Persisted job state and the values exchanged with the batch stepper
//!
//! The job is a two-phase machine (idle / running) whose entire state lives
//! in the progress store so a redeploy between steps loses nothing. `running`
//! plus the counters are the only state; the phase is `running` itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lease token minted at the start of a run.
///
/// Every processed marker carries the token of the run that wrote it, and a
/// step refuses to persist counters once its token has been superseded by a
/// newer start or an explicit stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunToken(String);

impl RunToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the persisted job state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    pub running: bool,
    /// Pagination offset for the next step while running.
    pub offset: u32,
    /// Candidate count computed at start time, frozen for the run.
    pub total: u32,
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Lease holder for the current run, `None` while idle.
    pub run_token: Option<RunToken>,
}

impl JobState {
    /// Counter invariant that must hold after every completed step.
    pub fn counters_consistent(&self) -> bool {
        self.processed == self.succeeded + self.failed && self.processed <= self.total
    }

    pub fn apply(&mut self, patch: &JobStatePatch) {
        if let Some(running) = patch.running {
            self.running = running;
        }
        if let Some(offset) = patch.offset {
            self.offset = offset;
        }
        if let Some(total) = patch.total {
            self.total = total;
        }
        if let Some(processed) = patch.processed {
            self.processed = processed;
        }
        if let Some(succeeded) = patch.succeeded {
            self.succeeded = succeeded;
        }
        if let Some(failed) = patch.failed {
            self.failed = failed;
        }
        if let Some(run_token) = &patch.run_token {
            self.run_token = run_token.clone();
        }
    }
}

/// Field-wise update applied to the persisted state; `None` leaves a field
/// untouched. `run_token` is doubly optional so a patch can clear the lease.
#[derive(Debug, Clone, Default)]
pub struct JobStatePatch {
    pub running: Option<bool>,
    pub offset: Option<u32>,
    pub total: Option<u32>,
    pub processed: Option<u32>,
    pub succeeded: Option<u32>,
    pub failed: Option<u32>,
    pub run_token: Option<Option<RunToken>>,
}

/// Classification of one item's processing. Failures are data, not errors:
/// one bad image must never abort the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Result of a control-surface toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Started,
    Stopped,
}

impl Toggled {
    pub fn as_str(&self) -> &'static str {
        match self {
            Toggled::Started => "started",
            Toggled::Stopped => "stopped",
        }
    }
}

/// What a single step invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepReport {
    /// Step fired while no run was in progress (stale timer tick).
    Skipped,
    /// The run lease was superseded mid-step; nothing was persisted.
    Stale,
    /// A full page was processed and the offset advanced.
    Progressed {
        page_len: usize,
        succeeded: u32,
        failed: u32,
        next_offset: u32,
    },
    /// The run finished with this step (short page or all items processed).
    Completed {
        page_len: usize,
        succeeded: u32,
        failed: u32,
    },
}

/// Read-only progress snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub running: bool,
    pub total: u32,
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl From<&JobState> for JobStatus {
    fn from(state: &JobState) -> Self {
        Self {
            running: state.running,
            total: state.total,
            processed: state.processed,
            succeeded: state.succeeded,
            failed: state.failed,
        }
    }
}
