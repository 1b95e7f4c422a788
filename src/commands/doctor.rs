use std::time::Duration;

use clap::Args;
use serde::Serialize;

use super::OutputFormat;
use crate::backend::{AgentBackend, DEFAULT_PROVIDER, HttpBackend};
use crate::config::{Settings, UrlKind};
use crate::error::ExitError;
use crate::subprocess::Tool;

const LAUNCHER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Args)]
pub struct DoctorArgs {
    /// Skip the agent backend check
    #[arg(long)]
    pub offline: bool,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub projects: Vec<ProjectStatus>,
    pub jira: CredentialStatus,
    pub confluence: CredentialStatus,
    pub launcher: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendStatus>,
    pub issues: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectStatus {
    pub identifier: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialStatus {
    pub configured: bool,
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolStatus {
    pub command: String,
    pub version: Option<String>,
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub url: String,
    pub provider: String,
    pub connected: bool,
}

impl DoctorArgs {
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let format = OutputFormat::resolve(self.format);
        let report = self.build_report(settings);
        let issue_count = report.issues.len();

        match format {
            OutputFormat::Pretty => print_pretty(&report),
            OutputFormat::Text => print_text(&report),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        }

        if issue_count > 0 {
            let code = u8::try_from(issue_count.min(125)).unwrap_or(125);
            return Err(ExitError::new(code, format!("{issue_count} issue(s) found")).into());
        }
        Ok(())
    }

    fn build_report(&self, settings: &Settings) -> DoctorReport {
        let mut issues = Vec::new();

        let projects: Vec<ProjectStatus> = settings
            .project_ids()
            .into_iter()
            .map(|identifier| {
                let missing: Vec<String> = UrlKind::ALL
                    .iter()
                    .filter(|kind| settings.lookup_url(**kind, &identifier).is_none())
                    .map(|kind| kind.key_for(&identifier))
                    .collect();
                ProjectStatus { identifier, missing }
            })
            .collect();

        if projects.is_empty() {
            issues.push("no projects configured (set PROJECT_REPO_<ID>)".to_string());
        }
        for project in projects.iter().filter(|p| !p.missing.is_empty()) {
            issues.push(format!(
                "project {} is missing {}",
                project.identifier,
                project.missing.join(", ")
            ));
        }

        let missing_jira = settings.missing_jira_keys();
        if !missing_jira.is_empty() {
            issues.push(format!("Jira credentials incomplete: {}", missing_jira.join(", ")));
        }
        let jira = CredentialStatus {
            configured: settings.jira.is_some(),
            missing: missing_jira,
        };
        // Confluence is optional; it is reported but never an issue
        let confluence = CredentialStatus {
            configured: settings.confluence.is_some(),
            missing: Vec::new(),
        };

        let launcher = check_launcher(&settings.mcp.command);
        if !launcher.present {
            issues.push(format!("MCP launcher not found: {}", launcher.command));
        }

        let backend = if self.offline {
            None
        } else {
            let http = HttpBackend::from_settings(settings);
            let connected = http.is_provider_connected(DEFAULT_PROVIDER);
            if !connected {
                issues.push(format!(
                    "provider {DEFAULT_PROVIDER} is not connected at {} (run `jira-orchestrator connect`)",
                    http.base_url()
                ));
            }
            Some(BackendStatus {
                url: http.base_url().to_string(),
                provider: DEFAULT_PROVIDER.to_string(),
                connected,
            })
        };

        DoctorReport {
            projects,
            jira,
            confluence,
            launcher,
            backend,
            issues,
        }
    }
}

fn check_launcher(command: &str) -> ToolStatus {
    let mut status = ToolStatus {
        command: command.to_string(),
        version: None,
        present: true,
    };

    match Tool::new(command).arg("--version").timeout(LAUNCHER_TIMEOUT).run_ok() {
        Ok(output) => status.version = Some(output.stdout.trim().to_string()),
        Err(e) => {
            tracing::debug!(command, error = %e, "launcher check failed");
            // A launcher that starts but rejects --version is still usable
            status.present = !matches!(
                e.downcast_ref::<ExitError>(),
                Some(ExitError::ToolNotFound { .. }) | None
            );
        }
    }
    status
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

fn print_pretty(report: &DoctorReport) {
    println!("=== Jira Orchestrator Doctor ===\n");

    println!("Projects:");
    if report.projects.is_empty() {
        println!("  (none)");
    }
    for project in &report.projects {
        if project.missing.is_empty() {
            println!("  ✓ {}", project.identifier);
        } else {
            println!("  ✗ {}: missing {}", project.identifier, project.missing.join(", "));
        }
    }

    println!("\nCredentials:");
    println!("  {} Jira", mark(report.jira.configured));
    if report.confluence.configured {
        println!("  ✓ Confluence");
    } else {
        println!("  - Confluence: not configured");
    }

    println!("\nTools:");
    match (&report.launcher.version, report.launcher.present) {
        (Some(version), true) => println!("  ✓ {}: {version}", report.launcher.command),
        (None, true) => println!("  ✓ {}", report.launcher.command),
        _ => println!("  ✗ {}: NOT FOUND", report.launcher.command),
    }

    if let Some(backend) = &report.backend {
        println!("\nBackend: {}", backend.url);
        println!("  {} provider {}", mark(backend.connected), backend.provider);
    }

    if report.issues.is_empty() {
        println!("\n✓ No issues found");
    } else {
        println!("\nIssues ({}):", report.issues.len());
        for issue in &report.issues {
            println!("  • {issue}");
        }
    }
}

fn print_text(report: &DoctorReport) {
    println!("jira-orchestrator-doctor  projects={}", report.projects.len());

    for project in &report.projects {
        if project.missing.is_empty() {
            println!("project  {}  ok", project.identifier);
        } else {
            println!("project  {}  missing  {}", project.identifier, project.missing.join(","));
        }
    }

    let status = |configured: bool| if configured { "ok" } else { "missing" };
    println!("credentials  jira  {}", status(report.jira.configured));
    println!("credentials  confluence  {}", status(report.confluence.configured));

    let launcher = if report.launcher.present {
        format!("ok  {}", report.launcher.version.as_deref().unwrap_or_default())
    } else {
        "missing".to_string()
    };
    println!("tool  {}  {}", report.launcher.command, launcher.trim_end());

    if let Some(backend) = &report.backend {
        let state = if backend.connected { "connected" } else { "disconnected" };
        println!("backend  {}  {}  {state}", backend.url, backend.provider);
    }

    if !report.issues.is_empty() {
        println!("issues  count={}", report.issues.len());
        for issue in &report.issues {
            println!("issue  {issue}");
        }
    }
}
