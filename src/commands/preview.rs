use clap::Args;
use serde::Serialize;

use super::{EventArgs, OutputFormat};
use crate::config::Settings;
use crate::issue::{CanonicalIssue, EventKind};
use crate::orchestrator;
use crate::prompt::Prompt;
use crate::status::IssueState;

#[derive(Debug, Args)]
pub struct PromptArgs {
    #[command(flatten)]
    pub event: EventArgs,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Serialize)]
struct PromptReport<'a> {
    kind: EventKind,
    state: IssueState,
    process: bool,
    issue: &'a CanonicalIssue,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a Prompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rendered: Option<String>,
}

impl PromptArgs {
    /// Show the prompt an event would produce without dispatching it.
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let (kind, raw) = self.event.read()?;
        let prepared = orchestrator::prepare(settings, kind, &raw)?;

        match OutputFormat::resolve(self.format) {
            OutputFormat::Json => {
                let report = PromptReport {
                    kind: prepared.kind,
                    state: prepared.state,
                    process: prepared.prompt.is_some(),
                    issue: &prepared.issue,
                    prompt: prepared.prompt.as_ref(),
                    rendered: prepared.prompt.as_ref().map(Prompt::render),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            format => {
                let Some(prompt) = &prepared.prompt else {
                    eprintln!(
                        "{} ({}) would be skipped: status {:?} is {} on {}",
                        prepared.issue.key,
                        prepared.issue.project_key,
                        prepared.issue.status,
                        prepared.state,
                        prepared.kind
                    );
                    return Ok(());
                };
                let text = prompt.render();
                if matches!(format, OutputFormat::Pretty) {
                    termimad::print_text(&text);
                } else {
                    println!("{text}");
                }
            }
        }
        Ok(())
    }
}
