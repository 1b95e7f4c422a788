use std::process::ExitCode;

/// Errors that cause jira-orchestrator to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    /// The issue could not be matched to a project, or the project is
    /// missing one or more required URL entries.
    #[error("{}", configuration_message(.identifier.as_deref(), .missing))]
    Configuration {
        identifier: Option<String>,
        missing: Vec<String>,
    },

    #[error("cannot connect provider {provider}: {reason}")]
    Connection { provider: String, reason: String },

    #[error("dispatch failed for {issue}: {reason}")]
    Dispatch { issue: String, reason: String },

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (exit {code}): {message}")]
    ToolFailed {
        tool: String,
        code: i32,
        message: String,
    },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("{message}")]
    WithCode { code: u8, message: String },

    #[error("{0}")]
    Other(String),
}

fn configuration_message(identifier: Option<&str>, missing: &[String]) -> String {
    match identifier {
        Some(id) => format!(
            "configuration error: project {id} is missing {}",
            missing.join(", ")
        ),
        None if missing.is_empty() => {
            "configuration error: no project identifier in summary tag or labels".to_string()
        }
        None => format!(
            "configuration error: no project identifier resolved (tried {})",
            missing.join(", ")
        ),
    }
}

impl ExitError {
    pub const fn new(code: u8, message: String) -> Self {
        ExitError::WithCode { code, message }
    }

    /// Configuration keys this error reports as missing.
    pub fn missing_keys(&self) -> &[String] {
        match self {
            ExitError::Configuration { missing, .. } => missing,
            _ => &[],
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            ExitError::Config(_) | ExitError::Configuration { .. } => ExitCode::from(2),
            ExitError::ToolNotFound { .. } => ExitCode::from(3),
            ExitError::ToolFailed { .. } => ExitCode::from(4),
            ExitError::Timeout { .. } => ExitCode::from(5),
            ExitError::Connection { .. } => ExitCode::from(7),
            ExitError::Dispatch { .. } => ExitCode::from(8),
            ExitError::InvalidPayload(_) => ExitCode::from(9),
            ExitError::WithCode { code, .. } => ExitCode::from(*code),
            ExitError::Other(_) => ExitCode::from(1),
        }
    }
}
