//! Event pipeline: normalize, classify, gate, build the prompt, dispatch.

use serde::Serialize;

use crate::backend::AgentBackend;
use crate::config::Settings;
use crate::error::ExitError;
use crate::issue::{CanonicalIssue, EventKind, RawIssue, normalize};
use crate::prompt::{self, Prompt};
use crate::status::{IssueState, classify, should_process};

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Dispatched { issue_key: String, state: IssueState },
    Skipped { issue_key: String, state: IssueState },
}

/// A normalized, classified event and the prompt it would produce.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub issue: CanonicalIssue,
    pub state: IssueState,
    pub kind: EventKind,
    /// `None` when the processing gate drops the event.
    pub prompt: Option<Prompt>,
}

/// Normalize and classify an event, and build its prompt unless the gate
/// drops it. Nothing is sent anywhere.
pub fn prepare(settings: &Settings, kind: EventKind, raw: &RawIssue) -> Result<Prepared, ExitError> {
    let issue = normalize(raw, settings)?;
    let state = classify(&issue.status);

    let prompt = if should_process(kind, state) {
        Some(prompt::build(&issue, state, kind))
    } else {
        None
    };

    Ok(Prepared {
        issue,
        state,
        kind,
        prompt,
    })
}

pub struct Orchestrator<'a, B> {
    settings: &'a Settings,
    backend: B,
}

impl<'a, B: AgentBackend> Orchestrator<'a, B> {
    pub const fn new(settings: &'a Settings, backend: B) -> Self {
        Self { settings, backend }
    }

    pub fn prepare(&self, kind: EventKind, raw: &RawIssue) -> Result<Prepared, ExitError> {
        prepare(self.settings, kind, raw)
    }

    /// Run one event through the whole pipeline.
    pub fn handle(&self, kind: EventKind, raw: &RawIssue) -> Result<Outcome, ExitError> {
        let _span = tracing::info_span!("event", kind = %kind, issue = %raw.key).entered();

        let prepared = self.prepare(kind, raw)?;
        let issue_key = prepared.issue.key.clone();

        let Some(prompt) = prepared.prompt else {
            tracing::info!(
                status = %prepared.issue.status,
                state = %prepared.state,
                "skipping issue"
            );
            return Ok(Outcome::Skipped {
                issue_key,
                state: prepared.state,
            });
        };

        let text = prompt.render();
        tracing::info!(state = %prepared.state, prompt_len = text.len(), "dispatching agent");

        if let Err(e) = self.backend.dispatch(&prepared.issue, &text) {
            let reason = format!("{e:#}");
            tracing::error!(error = %reason, "dispatch failed");
            return Err(ExitError::Dispatch {
                issue: issue_key,
                reason,
            });
        }

        Ok(Outcome::Dispatched {
            issue_key,
            state: prepared.state,
        })
    }

    /// Startup check: connect the provider unless it is already connected.
    /// Returns true when a connection was made.
    pub fn ensure_provider(&self, provider: &str) -> anyhow::Result<bool> {
        if self.backend.is_provider_connected(provider) {
            tracing::info!(provider, "provider already connected");
            return Ok(false);
        }
        tracing::info!(provider, "provider not connected, connecting");
        self.backend.connect_provider(provider)?;
        Ok(true)
    }
}
