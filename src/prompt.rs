use serde::Serialize;

use crate::config::UrlKind;
use crate::issue::{CanonicalIssue, EventKind};
use crate::status::IssueState;

/// One mandatory reference the agent must open before starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCheck {
    pub label: &'static str,
    pub url: String,
    pub purpose: &'static str,
}

/// Prompt sections in render order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub role: String,
    pub base_instruction: String,
    pub issue_info: String,
    pub instructions: Vec<String>,
    pub url_checks: Vec<UrlCheck>,
}

const REFERENCE_DOCS_NOTE: &str = "Also check the issue description for PRD and ARD links and read those documents as well before you start.";

/// Build the agent prompt for one issue.
///
/// Output depends only on the arguments: labels keep their input order and
/// the reference URLs always come in repository, contribution rules,
/// architecture rules order.
pub fn build(issue: &CanonicalIssue, state: IssueState, kind: EventKind) -> Prompt {
    let team = issue.team_name.as_deref().unwrap_or("the team");

    Prompt {
        role: role_definition(state, team),
        base_instruction: base_instruction(state).to_string(),
        issue_info: issue_information(issue, kind),
        instructions: instructions(state, &issue.key),
        url_checks: url_checks(issue),
    }
}

fn role_definition(state: IssueState, team: &str) -> String {
    match state {
        IssueState::SelectedForDevelopment => format!(
            "You are a Senior Software Developer working for {team}. You write production-quality code that follows the contribution and architecture rules of {team}, and you deliver every change through a pull request."
        ),
        IssueState::ToApprove => format!(
            "You are a Senior Software Architect reviewing work for {team}. You are responsible for code quality and for keeping every change aligned with the architecture and contribution rules of {team}."
        ),
        IssueState::Terminal | IssueState::Other => format!(
            "You are a Development Agent supporting {team}. You pick up Jira issues and move them forward according to the standards of {team}."
        ),
    }
}

fn base_instruction(state: IssueState) -> &'static str {
    match state {
        IssueState::SelectedForDevelopment => {
            "Implement the Jira issue described below and hand it over for approval."
        }
        IssueState::ToApprove => {
            "Review the implementation of the Jira issue described below and decide whether it can be approved."
        }
        IssueState::Terminal | IssueState::Other => {
            "Analyze the Jira issue described below and take the next appropriate step."
        }
    }
}

/// Comma-joined labels, or `(none)`.
pub fn format_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        "(none)".to_string()
    } else {
        labels.join(", ")
    }
}

fn issue_information(issue: &CanonicalIssue, kind: EventKind) -> String {
    let team = issue.team_name.as_deref().unwrap_or("(none)");
    let status = if issue.status.is_empty() {
        "(none)"
    } else {
        issue.status.as_str()
    };

    format!(
        "## Issue Information\n\nKey: {key}\nProject: {project}\nTeam: {team}\nStatus: {status}\nEvent: issue {kind}\nLabels: {labels}\nSummary: {summary}\n\nDescription:\n{description}",
        key = issue.key,
        project = issue.project_key,
        labels = format_labels(&issue.labels),
        summary = issue.summary,
        description = issue.description,
    )
}

fn instructions(state: IssueState, key: &str) -> Vec<String> {
    match state {
        IssueState::SelectedForDevelopment => vec![
            "Read the PRD and ARD documents linked in the issue description before writing any code.".to_string(),
            "Implement the changes the issue asks for, following the team contribution rules and architecture rules listed below.".to_string(),
            format!("Create a separate branch for this work and include the issue key {key} in the branch name."),
            format!("Open a pull request from that branch and reference {key} in its title and description."),
            format!("Update the status of {key} to \"To Approve\" using the Jira tools available to you."),
        ],
        IssueState::ToApprove => vec![
            format!("Review the pull request opened for {key} and assess the overall code quality."),
            "Check that the changes conform to the PRD, the ARD, the team contribution rules and the team architecture rules.".to_string(),
            "Leave review comments on the pull request for every problem you find.".to_string(),
            format!("If you approve the changes, update the status of {key} to \"To Approve by Human\" using the Jira tools available to you."),
            format!("If you reject the changes, update the status of {key} back to \"Selected for Development\" using the Jira tools available to you."),
        ],
        IssueState::Terminal | IssueState::Other => vec![
            "Read the PRD and ARD documents linked in the issue description.".to_string(),
            "Proceed with the issue according to the team standards described in the contribution and architecture rules below.".to_string(),
        ],
    }
}

fn url_checks(issue: &CanonicalIssue) -> Vec<UrlCheck> {
    UrlKind::ALL
        .iter()
        .map(|&kind| {
            let (label, purpose) = match kind {
                UrlKind::Repository => (
                    "Project repository",
                    "Use this repository for all code changes, branches and pull requests.",
                ),
                UrlKind::ContributionRules => (
                    "Team contribution rules",
                    "Follow these rules for branch naming, commits, pull requests and code style.",
                ),
                UrlKind::ArchitectureRules => (
                    "Team architecture rules",
                    "Every change must respect these architecture rules.",
                ),
            };
            UrlCheck {
                label,
                url: issue.url(kind).to_string(),
                purpose,
            }
        })
        .collect()
}

impl Prompt {
    /// Render the final prompt text.
    pub fn render(&self) -> String {
        let instructions = self
            .instructions
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        let checks = self
            .url_checks
            .iter()
            .map(|check| format!("- {}: {}\n  {}", check.label, check.url, check.purpose))
            .collect::<Vec<_>>()
            .join("\n");

        [
            format!("## Role\n\n{}", self.role),
            format!("## Task\n\n{}", self.base_instruction),
            self.issue_info.clone(),
            format!("## Instructions\n\n{instructions}"),
            format!(
                "## Mandatory References\n\nYou MUST read each of the following before you start:\n{checks}\n\n{REFERENCE_DOCS_NOTE}"
            ),
        ]
        .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(status: &str, labels: &[&str], team: Option<&str>) -> CanonicalIssue {
        CanonicalIssue {
            id: "10001".to_string(),
            key: "PROJ-7".to_string(),
            project_key: "PROJ".to_string(),
            status: status.to_string(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            summary: "[backend] Fix bug".to_string(),
            description: "PRD: https://docs.example.com/prd/7".to_string(),
            team_name: team.map(str::to_string),
            project_repo_url: "https://git.example.com/backend".to_string(),
            team_contribution_rules_url: "https://wiki.example.com/contributing".to_string(),
            team_architecture_rules_url: "https://wiki.example.com/architecture".to_string(),
        }
    }

    #[test]
    fn developer_prompt() {
        let issue = issue("Selected for Development", &["x", "y"], Some("backend"));
        let prompt = build(&issue, IssueState::SelectedForDevelopment, EventKind::Updated);

        assert!(prompt.role.contains("Senior Software Developer"));
        assert!(prompt.role.contains("backend"));
        assert_eq!(prompt.instructions.len(), 5);
        assert!(prompt.instructions[2].starts_with("Create a separate branch"));
        assert!(prompt.instructions[2].contains("PROJ-7"));
        assert!(prompt.instructions[4].contains("\"To Approve\""));

        let text = prompt.render();
        assert!(text.contains("Labels: x, y"));
        assert!(text.contains("3. Create a separate branch"));
        assert!(text.contains("Event: issue updated"));
    }

    #[test]
    fn architect_prompt() {
        let issue = issue("Ready to approve", &[], Some("backend"));
        let prompt = build(&issue, IssueState::ToApprove, EventKind::Updated);

        assert!(prompt.role.contains("Senior Software Architect"));
        assert!(prompt.instructions[0].contains("pull request opened for PROJ-7"));
        assert!(prompt.instructions[3].contains("\"To Approve by Human\""));
        assert!(prompt.instructions[4].contains("\"Selected for Development\""));
        assert!(prompt.render().contains("Labels: (none)"));
    }

    #[test]
    fn generic_prompt_without_team() {
        let issue = issue("In Progress", &[], None);
        let prompt = build(&issue, IssueState::Other, EventKind::Created);

        assert!(prompt.role.contains("Development Agent"));
        assert!(prompt.role.contains("the team"));
        assert_eq!(prompt.instructions.len(), 2);
        assert!(prompt.render().contains("Team: (none)"));
    }

    #[test]
    fn base_instruction_differs_per_state() {
        let a = base_instruction(IssueState::SelectedForDevelopment);
        let b = base_instruction(IssueState::ToApprove);
        let c = base_instruction(IssueState::Other);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn render_is_deterministic() {
        let issue = issue("Selected for Development", &["b", "a"], Some("backend"));
        let first = build(&issue, IssueState::SelectedForDevelopment, EventKind::Created).render();
        let second = build(&issue, IssueState::SelectedForDevelopment, EventKind::Created).render();
        assert_eq!(first, second);
        // Label order is preserved, not sorted
        assert!(first.contains("Labels: b, a"));
    }

    #[test]
    fn section_order_and_reference_block() {
        let issue = issue("Selected for Development", &[], Some("backend"));
        let text = build(&issue, IssueState::SelectedForDevelopment, EventKind::Created).render();

        let role = text.find("## Role").unwrap();
        let task = text.find("## Task").unwrap();
        let info = text.find("## Issue Information").unwrap();
        let steps = text.find("## Instructions").unwrap();
        let refs = text.find("## Mandatory References").unwrap();
        assert!(role < task && task < info && info < steps && steps < refs);

        let repo = text.find("https://git.example.com/backend").unwrap();
        let contrib = text.find("https://wiki.example.com/contributing").unwrap();
        let arch = text.find("https://wiki.example.com/architecture").unwrap();
        assert!(refs < repo && repo < contrib && contrib < arch);
        for url in [
            "https://git.example.com/backend",
            "https://wiki.example.com/contributing",
            "https://wiki.example.com/architecture",
        ] {
            assert_eq!(text.matches(url).count(), 1, "{url}");
        }
        assert!(text.ends_with(REFERENCE_DOCS_NOTE));
    }

    #[test]
    fn description_is_literal() {
        let mut issue = issue("Selected for Development", &[], Some("backend"));
        issue.description = "Line one\n\n  Line {two}".to_string();
        let text = build(&issue, IssueState::SelectedForDevelopment, EventKind::Created).render();
        assert!(text.contains("Description:\nLine one\n\n  Line {two}\n\n## Instructions"));
    }

    #[test]
    fn format_labels_cases() {
        assert_eq!(format_labels(&["x".to_string(), "y".to_string()]), "x, y");
        assert_eq!(format_labels(&[]), "(none)");
    }
}
