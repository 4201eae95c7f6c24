//! Per-loop failure bookkeeping surfaced through status.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{FailureKind, TransportError};

/// Consecutive all-failed passes after which a loop is reported as degraded.
pub const DEGRADED_AFTER_PASSES: u32 = 3;

/// Outcome of one pass over an operator's destinations.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub sent: u64,
    pub failed: u64,
    /// At least one send failed because the session is not authorized.
    pub unauthorized: bool,
    pub last_error: Option<String>,
    pub last_failure_kind: Option<FailureKind>,
}

impl PassReport {
    pub fn record_failure(&mut self, err: &TransportError) {
        let kind = err.kind();
        self.failed += 1;
        self.unauthorized |= kind == FailureKind::Unauthorized;
        self.last_error = Some(err.to_string());
        self.last_failure_kind = Some(kind);
    }

    /// Nothing was delivered although something was attempted.
    pub fn all_failed(&self) -> bool {
        self.sent == 0 && self.failed > 0
    }
}

/// Running totals for one broadcast loop.
#[derive(Debug, Clone, Serialize)]
pub struct LoopHealth {
    pub started_at: DateTime<Utc>,
    pub passes: u64,
    pub sent: u64,
    pub failed: u64,
    pub backoffs: u64,
    pub consecutive_failed_passes: u32,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub last_failure_kind: Option<FailureKind>,
}

impl LoopHealth {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            passes: 0,
            sent: 0,
            failed: 0,
            backoffs: 0,
            consecutive_failed_passes: 0,
            last_pass_at: None,
            last_error: None,
            last_failure_kind: None,
        }
    }

    pub fn record_pass(&mut self, report: &PassReport) {
        self.passes += 1;
        self.sent += report.sent;
        self.failed += report.failed;
        self.last_pass_at = Some(Utc::now());
        if report.all_failed() {
            self.consecutive_failed_passes += 1;
        } else {
            self.consecutive_failed_passes = 0;
        }
        if report.last_error.is_some() {
            self.last_error = report.last_error.clone();
            self.last_failure_kind = report.last_failure_kind;
        }
    }

    /// A pass could not run at all and the loop is backing off.
    pub fn record_backoff(&mut self, reason: &str) {
        self.backoffs += 1;
        self.consecutive_failed_passes += 1;
        self.last_error = Some(reason.to_string());
        self.last_failure_kind = Some(FailureKind::Transient);
    }

    /// Whether recent passes delivered nothing.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failed_passes >= DEGRADED_AFTER_PASSES
    }
}

impl Default for LoopHealth {
    fn default() -> Self {
        Self::new()
    }
}
