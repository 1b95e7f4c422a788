use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::AgentBackend;
use crate::config::{AtlassianCredentials, LlmSettings, McpSettings, Settings};
use crate::error::ExitError;
use crate::issue::CanonicalIssue;

/// Agent runtime reached over HTTP.
///
/// Endpoints, relative to `BACKEND_URL`:
/// - `GET  /api/mcp/servers/{name}`: provider status
/// - `POST /api/mcp/servers`: register and connect a provider
/// - `POST /api/conversations`: start an agent run
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
    llm: LlmSettings,
    mcp: McpSettings,
    jira: Option<AtlassianCredentials>,
    confluence: Option<AtlassianCredentials>,
    missing_credentials: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderStatus {
    #[serde(default)]
    connected: bool,
}

#[derive(Debug, Serialize)]
struct ProviderSpec<'a> {
    name: &'a str,
    command: &'a str,
    args: &'a [String],
    env: BTreeMap<&'static str, &'a str>,
}

#[derive(Debug, Serialize)]
struct ConversationRequest<'a> {
    title: String,
    issue_key: &'a str,
    repository: &'a str,
    initial_user_msg: &'a str,
    llm_model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_api_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_base_url: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationResponse {
    #[serde(default)]
    conversation_id: Option<String>,
}

impl HttpBackend {
    pub fn from_settings(settings: &Settings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(settings.backend.timeout))
            .build();

        Self {
            agent: config.into(),
            base_url: settings.backend.url.clone(),
            api_key: settings.backend.api_key.clone(),
            llm: settings.llm.clone(),
            mcp: settings.mcp.clone(),
            jira: settings.jira.clone(),
            confluence: settings.confluence.clone(),
            missing_credentials: settings.missing_jira_keys(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_auth<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    fn provider_spec<'a>(
        &'a self,
        provider: &'a str,
        jira: &'a AtlassianCredentials,
    ) -> ProviderSpec<'a> {
        let mut env = BTreeMap::new();
        env.insert("JIRA_URL", jira.url.as_str());
        env.insert("JIRA_USERNAME", jira.username.as_str());
        env.insert("JIRA_API_TOKEN", jira.api_token.as_str());
        if let Some(confluence) = &self.confluence {
            env.insert("CONFLUENCE_URL", confluence.url.as_str());
            env.insert("CONFLUENCE_USERNAME", confluence.username.as_str());
            env.insert("CONFLUENCE_API_TOKEN", confluence.api_token.as_str());
        }

        ProviderSpec {
            name: provider,
            command: &self.mcp.command,
            args: &self.mcp.args,
            env,
        }
    }
}

impl AgentBackend for HttpBackend {
    fn is_provider_connected(&self, provider: &str) -> bool {
        let url = format!("{}/api/mcp/servers/{provider}", self.base_url);
        let response = self.with_auth(self.agent.get(&url)).call();

        match response {
            Ok(resp) => match resp.into_body().read_json::<ProviderStatus>() {
                Ok(status) => status.connected,
                Err(e) => {
                    tracing::warn!(provider, error = %e, "unreadable provider status");
                    false
                }
            },
            Err(ureq::Error::StatusCode(404)) => false,
            Err(e) => {
                tracing::warn!(provider, error = %e, "provider status check failed");
                false
            }
        }
    }

    fn connect_provider(&self, provider: &str) -> anyhow::Result<()> {
        let Some(jira) = &self.jira else {
            return Err(ExitError::Connection {
                provider: provider.to_string(),
                reason: format!("missing {}", self.missing_credentials.join(", ")),
            }
            .into());
        };

        let url = format!("{}/api/mcp/servers", self.base_url);
        let spec = self.provider_spec(provider, jira);
        self.with_auth(self.agent.post(&url))
            .send_json(&spec)
            .map_err(|e| ExitError::Connection {
                provider: provider.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(provider, command = %self.mcp.command, "provider connected");
        Ok(())
    }

    fn dispatch(&self, issue: &CanonicalIssue, prompt: &str) -> anyhow::Result<()> {
        let url = format!("{}/api/conversations", self.base_url);
        let request = ConversationRequest {
            title: format!("{}: {}", issue.key, issue.summary),
            issue_key: &issue.key,
            repository: &issue.project_repo_url,
            initial_user_msg: prompt,
            llm_model: &self.llm.model,
            llm_api_key: self.llm.api_key.as_deref(),
            llm_base_url: self.llm.base_url.as_deref(),
        };

        let resp = self
            .with_auth(self.agent.post(&url))
            .send_json(&request)
            .with_context(|| format!("POST {url}"))?;

        // Only the id is of interest, and only for the log line
        let accepted = resp
            .into_body()
            .read_json::<ConversationResponse>()
            .unwrap_or_default();
        tracing::info!(
            issue = %issue.key,
            conversation = accepted.conversation_id.as_deref().unwrap_or("unknown"),
            "agent run accepted"
        );
        Ok(())
    }
}
