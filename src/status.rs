//! Status classification and the processing gate.
//!
//! Jira status names are free text and differ between workflows. They are
//! mapped onto a closed set of states once, here, so the prompt builder and
//! the gate never match on raw strings.

use std::fmt;

use serde::Serialize;

use crate::issue::EventKind;

/// Status names (compared case-insensitively) that end the workflow.
pub const TERMINAL_STATUSES: [&str; 4] = ["done", "closed", "resolved", "cancelled"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// Status contains both "selected" and "development"
    SelectedForDevelopment,
    /// Status contains "approve"
    ToApprove,
    /// Status is exactly one of [`TERMINAL_STATUSES`]
    Terminal,
    Other,
}

impl IssueState {
    pub const fn as_str(self) -> &'static str {
        match self {
            IssueState::SelectedForDevelopment => "selected_for_development",
            IssueState::ToApprove => "to_approve",
            IssueState::Terminal => "terminal",
            IssueState::Other => "other",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a status string. First match wins, in this order:
/// terminal, selected-for-development, to-approve, other.
pub fn classify(status: &str) -> IssueState {
    let lowered = status.to_lowercase();

    if TERMINAL_STATUSES.contains(&lowered.trim()) {
        return IssueState::Terminal;
    }
    if lowered.contains("selected") && lowered.contains("development") {
        return IssueState::SelectedForDevelopment;
    }
    if lowered.contains("approve") {
        return IssueState::ToApprove;
    }
    IssueState::Other
}

/// Decide whether an event should be processed.
///
/// Only updates are gated, and only terminal issues are dropped. Created
/// events always go through.
pub fn should_process(kind: EventKind, state: IssueState) -> bool {
    match kind {
        EventKind::Created => true,
        EventKind::Updated => state != IssueState::Terminal,
    }
}
