use clap::Args;
use serde_json::json;

use crate::backend::{DEFAULT_PROVIDER, HttpBackend};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Tool provider to connect on the agent backend
    #[arg(long, default_value = DEFAULT_PROVIDER)]
    pub provider: String,
}

impl ConnectArgs {
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let backend = HttpBackend::from_settings(settings);
        let connected = Orchestrator::new(settings, &backend).ensure_provider(&self.provider)?;

        let status = if connected { "connected" } else { "already_connected" };
        println!("{}", json!({"provider": self.provider, "status": status}));
        Ok(())
    }
}
