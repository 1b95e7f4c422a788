//! jira-orchestrator - turn Jira issue webhooks into coding-agent runs

pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod issue;
pub mod orchestrator;
pub mod prompt;
pub mod status;
pub mod subprocess;
pub mod telemetry;
