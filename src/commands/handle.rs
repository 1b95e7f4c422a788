use clap::Args;

use super::EventArgs;
use crate::backend::HttpBackend;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Args)]
pub struct HandleArgs {
    #[command(flatten)]
    pub event: EventArgs,
}

impl HandleArgs {
    /// Process one webhook event and print the outcome as JSON.
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let (kind, raw) = self.event.read()?;

        let backend = HttpBackend::from_settings(settings);
        tracing::debug!(backend = backend.base_url(), "using http backend");

        let outcome = Orchestrator::new(settings, &backend).handle(kind, &raw)?;
        println!("{}", serde_json::to_string(&outcome)?);
        Ok(())
    }
}
