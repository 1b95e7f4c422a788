pub mod connect;
pub mod doctor;
pub mod handle;
pub mod preview;
pub mod schema;

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::error::ExitError;
use crate::issue::{EventKind, RawIssue, parse_payload};

/// Which webhook produced the payload.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum EventArg {
    Created,
    Updated,
    /// Read the kind from the payload's `webhookEvent`
    Auto,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Text,
    Json,
}

impl OutputFormat {
    /// Pretty on a terminal, text otherwise.
    pub fn resolve(format: Option<Self>) -> Self {
        format.unwrap_or_else(|| {
            if std::io::stdout().is_terminal() {
                OutputFormat::Pretty
            } else {
                OutputFormat::Text
            }
        })
    }
}

/// Arguments shared by commands that consume one webhook event.
#[derive(Debug, Args)]
pub struct EventArgs {
    /// Event kind
    #[arg(value_enum)]
    pub kind: EventArg,
    /// Webhook JSON body (`-` or omitted reads stdin)
    #[arg(long)]
    pub payload: Option<PathBuf>,
}

impl EventArgs {
    /// Read and parse the payload, resolving the event kind.
    pub fn read(&self) -> anyhow::Result<(EventKind, RawIssue)> {
        let body = match &self.payload {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
                .with_context(|| format!("reading payload {}", path.display()))?,
            _ => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("reading payload from stdin")?;
                buf
            }
        };

        let event = parse_payload(&body)?;
        let kind = match self.kind {
            EventArg::Created => EventKind::Created,
            EventArg::Updated => EventKind::Updated,
            EventArg::Auto => {
                let name = event.webhook_event.as_deref().unwrap_or_default();
                EventKind::from_webhook_event(name).ok_or_else(|| {
                    ExitError::InvalidPayload(if name.is_empty() {
                        "no webhookEvent in payload; pass created or updated".to_string()
                    } else {
                        format!("unsupported webhookEvent {name:?}")
                    })
                })?
            }
        };

        tracing::debug!(kind = %kind, issue = %event.issue.key, "payload read");
        Ok((kind, event.issue))
    }
}
