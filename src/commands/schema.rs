use schemars::schema_for;

use crate::issue::WebhookPayload;

/// Print the JSON Schema for the accepted webhook body to stdout.
pub fn run_schema() -> anyhow::Result<()> {
    let schema = schema_for!(WebhookPayload);
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{json}");
    Ok(())
}
