//! Execution backend contract.
//!
//! The orchestrator only ever talks to an agent runtime through
//! [`AgentBackend`], so tests can substitute a recording stand-in.

mod http;

pub use http::HttpBackend;

use crate::issue::CanonicalIssue;

/// MCP provider the agent needs for Jira and Confluence access.
pub const DEFAULT_PROVIDER: &str = "atlassian";

pub trait AgentBackend {
    /// True when the named MCP provider is connected. Lookup failures count
    /// as not connected.
    fn is_provider_connected(&self, provider: &str) -> bool;

    /// Connect the named MCP provider. Fails with
    /// [`ExitError::Connection`](crate::error::ExitError::Connection) when the
    /// credentials it needs are not configured.
    fn connect_provider(&self, provider: &str) -> anyhow::Result<()>;

    /// Start an agent run for the issue. Returns once the backend has
    /// accepted the run; the run's output is never collected.
    fn dispatch(&self, issue: &CanonicalIssue, prompt: &str) -> anyhow::Result<()>;
}

impl<B: AgentBackend + ?Sized> AgentBackend for &B {
    fn is_provider_connected(&self, provider: &str) -> bool {
        (**self).is_provider_connected(provider)
    }

    fn connect_provider(&self, provider: &str) -> anyhow::Result<()> {
        (**self).connect_provider(provider)
    }

    fn dispatch(&self, issue: &CanonicalIssue, prompt: &str) -> anyhow::Result<()> {
        (**self).dispatch(issue, prompt)
    }
}
