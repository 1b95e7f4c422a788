//! Webhook payload shapes and the normalizer that turns them into a
//! [`CanonicalIssue`].

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::{Settings, UrlKind, normalize_identifier};
use crate::error::ExitError;

/// Which webhook delivered the event. The payload shape is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
}

impl EventKind {
    /// Map a Jira `webhookEvent` value such as `jira:issue_updated`.
    pub fn from_webhook_event(event: &str) -> Option<Self> {
        match event {
            "jira:issue_created" => Some(EventKind::Created),
            "jira:issue_updated" => Some(EventKind::Updated),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jira webhook envelope. Bare issue objects are accepted as well, see
/// [`parse_payload`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WebhookPayload {
    #[serde(default, rename = "webhookEvent")]
    pub webhook_event: Option<String>,
    pub issue: RawIssue,
}

/// Issue object as delivered by Jira. Field types are kept loose because
/// Jira sends ids as strings or numbers and `status` as an object or scalar.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RawIssue {
    #[serde(default)]
    pub id: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: RawFields,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RawFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub labels: Value,
    #[serde(default)]
    pub status: Value,
}

/// Any JSON scalar as text; null becomes empty.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| scalar_text(&value))
}

fn null_as_default<'de, D>(deserializer: D) -> Result<RawFields, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawFields>::deserialize(deserializer)?.unwrap_or_default())
}

/// A parsed event body: the issue plus the envelope's `webhookEvent`, if any.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    pub webhook_event: Option<String>,
    pub issue: RawIssue,
}

/// Parse a webhook body. Accepts the Jira envelope (`{"issue": {...}}`) or a
/// bare issue object.
pub fn parse_payload(body: &str) -> Result<IncomingEvent, ExitError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ExitError::InvalidPayload(format!("not valid JSON: {e}")))?;

    if value.get("issue").is_some_and(Value::is_object) {
        let payload: WebhookPayload = serde_json::from_value(value)
            .map_err(|e| ExitError::InvalidPayload(e.to_string()))?;
        return Ok(IncomingEvent {
            webhook_event: payload.webhook_event,
            issue: payload.issue,
        });
    }

    if !value.is_object() {
        return Err(ExitError::InvalidPayload(
            "expected an issue object or a webhook envelope".to_string(),
        ));
    }

    let issue: RawIssue =
        serde_json::from_value(value).map_err(|e| ExitError::InvalidPayload(e.to_string()))?;
    Ok(IncomingEvent {
        webhook_event: None,
        issue,
    })
}

/// Normalized issue record. Built once per event by [`normalize`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalIssue {
    pub id: String,
    pub key: String,
    pub project_key: String,
    pub status: String,
    pub labels: Vec<String>,
    pub summary: String,
    pub description: String,
    pub team_name: Option<String>,
    pub project_repo_url: String,
    pub team_contribution_rules_url: String,
    pub team_architecture_rules_url: String,
}

impl CanonicalIssue {
    /// Reference URL of the given kind.
    pub fn url(&self, kind: UrlKind) -> &str {
        match kind {
            UrlKind::Repository => &self.project_repo_url,
            UrlKind::ContributionRules => &self.team_contribution_rules_url,
            UrlKind::ArchitectureRules => &self.team_architecture_rules_url,
        }
    }
}

/// Project identifier in both raw (as written) and normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentifier {
    pub raw: String,
    pub normalized: String,
}

fn re_summary_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\[([^\]]+)\]").expect("static regex"))
}

/// Raw tag from a leading `[tag]` in the summary.
pub fn summary_tag(summary: &str) -> Option<&str> {
    re_summary_tag()
        .captures(summary)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|tag| !tag.is_empty())
}

/// Resolve the project identifier: a summary tag wins, otherwise the first
/// label whose normalized form has a configured repository URL.
pub fn resolve_identifier(
    summary: &str,
    labels: &[String],
    settings: &Settings,
) -> Option<ProjectIdentifier> {
    if let Some(tag) = summary_tag(summary) {
        return Some(ProjectIdentifier {
            raw: tag.to_string(),
            normalized: normalize_identifier(tag),
        });
    }

    labels.iter().find_map(|label| {
        let normalized = normalize_identifier(label);
        settings.has_project(&normalized).then(|| ProjectIdentifier {
            raw: label.clone(),
            normalized,
        })
    })
}

/// Stringify the status field: the `name` of an object, the text of a
/// scalar, or empty.
fn status_text(status: &Value) -> String {
    match status {
        Value::Object(map) => map.get("name").map(scalar_text).unwrap_or_default(),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn label_list(labels: &Value) -> Vec<String> {
    match labels {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Build a [`CanonicalIssue`] from a raw issue and the URL table.
///
/// Fails with [`ExitError::Configuration`] when no identifier resolves or
/// when any of the three reference URLs is missing; all missing keys are
/// reported together.
pub fn normalize(raw: &RawIssue, settings: &Settings) -> Result<CanonicalIssue, ExitError> {
    let key = raw.key.trim().to_string();
    let project_key = key
        .split_once('-')
        .map_or(key.as_str(), |(project, _)| project)
        .to_string();

    let status = status_text(&raw.fields.status);
    let labels = label_list(&raw.fields.labels);
    let summary = raw.fields.summary.clone();
    let description = scalar_text(&raw.fields.description);

    let Some(identifier) = resolve_identifier(&summary, &labels, settings) else {
        let tried = labels
            .iter()
            .map(|label| UrlKind::Repository.key_for(&normalize_identifier(label)))
            .collect();
        return Err(ExitError::Configuration {
            identifier: None,
            missing: tried,
        });
    };

    let missing: Vec<String> = UrlKind::ALL
        .iter()
        .filter(|kind| settings.lookup_url(**kind, &identifier.normalized).is_none())
        .map(|kind| kind.key_for(&identifier.normalized))
        .collect();
    if !missing.is_empty() {
        return Err(ExitError::Configuration {
            identifier: Some(identifier.normalized),
            missing,
        });
    }
    let url = |kind: UrlKind| {
        settings
            .lookup_url(kind, &identifier.normalized)
            .unwrap_or_default()
            .to_string()
    };
    let project_repo_url = url(UrlKind::Repository);
    let team_contribution_rules_url = url(UrlKind::ContributionRules);
    let team_architecture_rules_url = url(UrlKind::ArchitectureRules);

    let project = identifier.normalized.clone();
    let team_name = if identifier.raw.is_empty() {
        (!project_key.is_empty()).then(|| project_key.clone())
    } else {
        Some(identifier.raw)
    };

    tracing::debug!(
        issue = %key,
        project = %project,
        status = %status,
        "normalized issue"
    );

    Ok(CanonicalIssue {
        id: scalar_text(&raw.id),
        key,
        project_key,
        status,
        labels,
        summary,
        description,
        team_name,
        project_repo_url,
        team_contribution_rules_url,
        team_architecture_rules_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend_settings() -> Settings {
        Settings::from_vars([
            ("PROJECT_REPO_BACKEND", "https://git.example.com/backend"),
            ("TEAM_CONTRIBUTION_RULES_URL_BACKEND", "https://wiki.example.com/backend/contributing"),
            ("ARCHITECTURE_RULES_URL_BACKEND", "https://wiki.example.com/backend/architecture"),
        ])
        .unwrap()
    }

    fn raw(value: Value) -> RawIssue {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalizes_tagged_summary() {
        let issue = normalize(
            &raw(json!({
                "id": "10001",
                "key": "PROJ-123",
                "fields": {
                    "summary": "[backend] Add login",
                    "description": "See PRD: https://docs.example.com/prd/42",
                    "labels": ["auth", "q3"],
                    "status": {"name": "Selected for Development"}
                }
            })),
            &backend_settings(),
        )
        .unwrap();

        assert_eq!(issue.id, "10001");
        assert_eq!(issue.key, "PROJ-123");
        assert_eq!(issue.project_key, "PROJ");
        assert_eq!(issue.status, "Selected for Development");
        assert_eq!(issue.labels, vec!["auth", "q3"]);
        assert_eq!(issue.team_name.as_deref(), Some("backend"));
        assert_eq!(issue.project_repo_url, "https://git.example.com/backend");
        assert_eq!(
            issue.team_contribution_rules_url,
            "https://wiki.example.com/backend/contributing"
        );
        assert_eq!(
            issue.team_architecture_rules_url,
            "https://wiki.example.com/backend/architecture"
        );
    }

    #[test]
    fn each_missing_url_is_reported_alone() {
        let all = [
            ("PROJECT_REPO_BACKEND", "https://git.example.com/backend"),
            ("TEAM_CONTRIBUTION_RULES_URL_BACKEND", "https://wiki.example.com/c"),
            ("ARCHITECTURE_RULES_URL_BACKEND", "https://wiki.example.com/a"),
        ];
        let payload = raw(json!({
            "key": "PROJ-1",
            "fields": {"summary": "[backend] Add login"}
        }));

        for skip in 0..all.len() {
            let vars: Vec<_> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, kv)| *kv)
                .collect();
            let settings = Settings::from_vars(vars).unwrap();
            let err = normalize(&payload, &settings).unwrap_err();
            assert_eq!(err.missing_keys(), &[all[skip].0.to_string()]);
        }
    }

    #[test]
    fn all_missing_urls_reported_in_one_error() {
        let settings = Settings::from_vars(Vec::<(String, String)>::new()).unwrap();
        let err = normalize(
            &raw(json!({"key": "PROJ-1", "fields": {"summary": "[web app] Fix"}})),
            &settings,
        )
        .unwrap_err();
        assert_eq!(
            err.missing_keys(),
            &[
                "PROJECT_REPO_WEB_APP".to_string(),
                "TEAM_CONTRIBUTION_RULES_URL_WEB_APP".to_string(),
                "ARCHITECTURE_RULES_URL_WEB_APP".to_string(),
            ]
        );
        assert!(matches!(err, ExitError::Configuration { identifier: Some(ref id), .. } if id == "WEB_APP"));
    }

    #[test]
    fn label_fallback_uses_first_configured_label() {
        let issue = normalize(
            &raw(json!({
                "key": "OPS-9",
                "fields": {
                    "summary": "Rotate certificates",
                    "labels": ["urgent", "Backend", "frontend"],
                    "status": "To Do"
                }
            })),
            &backend_settings(),
        )
        .unwrap();
        assert_eq!(issue.team_name.as_deref(), Some("Backend"));
        assert_eq!(issue.project_repo_url, "https://git.example.com/backend");
        assert_eq!(issue.status, "To Do");
    }

    #[test]
    fn unresolved_identifier_lists_tried_keys() {
        let err = normalize(
            &raw(json!({
                "key": "OPS-9",
                "fields": {"summary": "No tag here", "labels": ["infra", "on-call"]}
            })),
            &backend_settings(),
        )
        .unwrap_err();
        assert!(matches!(err, ExitError::Configuration { identifier: None, .. }));
        assert_eq!(
            err.missing_keys(),
            &["PROJECT_REPO_INFRA".to_string(), "PROJECT_REPO_ON_CALL".to_string()]
        );
    }

    #[test]
    fn summary_tag_beats_labels() {
        let settings = Settings::from_vars([
            ("PROJECT_REPO_BACKEND", "https://git.example.com/backend"),
            ("TEAM_CONTRIBUTION_RULES_URL_BACKEND", "https://wiki.example.com/c"),
            ("ARCHITECTURE_RULES_URL_BACKEND", "https://wiki.example.com/a"),
            ("PROJECT_REPO_FRONTEND", "https://git.example.com/frontend"),
        ])
        .unwrap();
        let id = resolve_identifier("[backend] thing", &["frontend".to_string()], &settings).unwrap();
        assert_eq!(id.raw, "backend");
        assert_eq!(id.normalized, "BACKEND");
    }

    #[test]
    fn summary_tag_parsing() {
        assert_eq!(summary_tag("[backend] Add login"), Some("backend"));
        assert_eq!(summary_tag("  [Data Platform] x"), Some("Data Platform"));
        assert_eq!(summary_tag("Add [backend] login"), None);
        assert_eq!(summary_tag("[] empty"), None);
        assert_eq!(summary_tag(""), None);
    }

    #[test]
    fn loose_field_shapes() {
        let issue = normalize(
            &raw(json!({
                "id": 10002,
                "key": "PROJ-5",
                "fields": {
                    "summary": "[backend] x",
                    "labels": "not-a-list",
                    "description": null
                }
            })),
            &backend_settings(),
        )
        .unwrap();
        assert_eq!(issue.id, "10002");
        assert!(issue.labels.is_empty());
        assert_eq!(issue.description, "");
        assert_eq!(issue.status, "");
    }

    #[test]
    fn odd_scalars_and_null_fields_fall_back_to_defaults() {
        let event = parse_payload(
            r#"{"issue": {"id": 7, "key": "PROJ-8", "fields": {"summary": 42, "labels": ["backend"]}}}"#,
        )
        .unwrap();
        assert_eq!(event.issue.fields.summary, "42");
        let issue = normalize(&event.issue, &backend_settings()).unwrap();
        assert_eq!(issue.summary, "42");
        assert_eq!(issue.team_name.as_deref(), Some("backend"));

        let event = parse_payload(r#"{"key": "PROJ-9", "fields": null}"#).unwrap();
        assert_eq!(event.issue.key, "PROJ-9");
        assert_eq!(event.issue.fields.summary, "");

        let event = parse_payload(r#"{"key": null, "fields": {"summary": null}}"#).unwrap();
        assert_eq!(event.issue.key, "");
        assert_eq!(event.issue.fields.summary, "");

        // Nothing identifies a project, so only the configuration check fails
        let err = normalize(&event.issue, &backend_settings()).unwrap_err();
        assert!(matches!(err, ExitError::Configuration { .. }));
    }

    #[test]
    fn non_ascii_tag_matches_uppercased_keys() {
        let settings = Settings::from_vars([
            ("PROJECT_REPO_équipe", "https://git.example.com/equipe"),
            ("TEAM_CONTRIBUTION_RULES_URL_ÉQUIPE", "https://wiki.example.com/equipe/contrib"),
            ("ARCHITECTURE_RULES_URL_ÉQUIPE", "https://wiki.example.com/equipe/arch"),
        ])
        .unwrap();
        let issue = normalize(
            &raw(json!({"key": "PROJ-3", "fields": {"summary": "[équipe] Traduire"}})),
            &settings,
        )
        .unwrap();
        assert_eq!(issue.team_name.as_deref(), Some("équipe"));
        assert_eq!(issue.project_repo_url, "https://git.example.com/equipe");
    }

    #[test]
    fn key_without_hyphen_is_its_own_project_key() {
        let issue = normalize(
            &raw(json!({"key": "STANDALONE", "fields": {"summary": "[backend] x"}})),
            &backend_settings(),
        )
        .unwrap();
        assert_eq!(issue.project_key, "STANDALONE");
    }

    #[test]
    fn parse_envelope_and_bare_issue() {
        let event = parse_payload(
            r#"{"webhookEvent": "jira:issue_updated", "issue": {"id": "1", "key": "PROJ-1", "fields": {}}}"#,
        )
        .unwrap();
        assert_eq!(event.webhook_event.as_deref(), Some("jira:issue_updated"));
        assert_eq!(event.issue.key, "PROJ-1");

        let event = parse_payload(r#"{"id": "1", "key": "PROJ-2", "fields": {}}"#).unwrap();
        assert!(event.webhook_event.is_none());
        assert_eq!(event.issue.key, "PROJ-2");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_payload("nope"), Err(ExitError::InvalidPayload(_))));
        assert!(matches!(parse_payload("[1, 2]"), Err(ExitError::InvalidPayload(_))));
    }

    #[test]
    fn event_kind_from_webhook_event() {
        assert_eq!(EventKind::from_webhook_event("jira:issue_created"), Some(EventKind::Created));
        assert_eq!(EventKind::from_webhook_event("jira:issue_updated"), Some(EventKind::Updated));
        assert_eq!(EventKind::from_webhook_event("jira:issue_deleted"), None);
    }
}
