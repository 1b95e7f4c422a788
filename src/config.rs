use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use crate::error::ExitError;

/// Dotenv file read when no `--env-file` is given.
pub const DEFAULT_ENV_FILE: &str = ".env";

pub const DEFAULT_LLM_MODEL: &str = "anthropic/claude-sonnet-4-5-20250929";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MCP_COMMAND: &str = "npx";
pub const DEFAULT_MCP_ARGS: &str = "-y,@sooperset/mcp-atlassian";

/// The three per-project reference URLs every issue must resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Repository,
    ContributionRules,
    ArchitectureRules,
}

impl UrlKind {
    /// Fixed lookup and rendering order.
    pub const ALL: [UrlKind; 3] = [
        UrlKind::Repository,
        UrlKind::ContributionRules,
        UrlKind::ArchitectureRules,
    ];

    pub const fn prefix(self) -> &'static str {
        match self {
            UrlKind::Repository => "PROJECT_REPO_",
            UrlKind::ContributionRules => "TEAM_CONTRIBUTION_RULES_URL_",
            UrlKind::ArchitectureRules => "ARCHITECTURE_RULES_URL_",
        }
    }

    /// Configuration key for a normalized project identifier.
    pub fn key_for(self, identifier: &str) -> String {
        format!("{}{identifier}", self.prefix())
    }
}

/// Normalize a project/team tag into the form used in configuration keys:
/// trimmed, uppercase, spaces and hyphens replaced by underscores.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other,
        })
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// URL, username and API token for one Atlassian product.
#[derive(Clone, PartialEq, Eq)]
pub struct AtlassianCredentials {
    pub url: String,
    pub username: String,
    pub api_token: String,
}

impl fmt::Debug for AtlassianCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlassianCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("api_token", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpSettings {
    pub command: String,
    pub args: Vec<String>,
}

/// Process-wide settings, loaded once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Project URL entries keyed by their full configuration key.
    project_urls: BTreeMap<String, String>,
    /// Every non-empty key seen, used to report missing credentials.
    present: BTreeMap<String, String>,
    pub llm: LlmSettings,
    pub backend: BackendSettings,
    pub jira: Option<AtlassianCredentials>,
    pub confluence: Option<AtlassianCredentials>,
    pub mcp: McpSettings,
}

impl Settings {
    /// Load settings from the process environment layered over a dotenv file.
    ///
    /// An explicit `env_file` must exist; the default `.env` is optional.
    /// Process environment values win over file values.
    pub fn load(env_file: Option<&Path>) -> anyhow::Result<Self> {
        let mut vars: Vec<(String, String)> = Vec::new();

        let file = match env_file {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = Path::new(DEFAULT_ENV_FILE);
                default.exists().then(|| default.to_path_buf())
            }
        };

        if let Some(path) = file {
            let iter = dotenvy::from_path_iter(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            for item in iter {
                let (key, value) =
                    item.with_context(|| format!("parsing {}", path.display()))?;
                vars.push((key, value));
            }
            tracing::debug!(path = %path.display(), "loaded env file");
        }

        // Later entries win, so the environment goes last.
        vars.extend(unicode_vars(std::env::vars_os()));
        Ok(Self::from_vars(vars)?)
    }

    /// Build settings from key/value pairs. Keys are uppercased and values
    /// that are blank after trimming are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ExitError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut present = BTreeMap::new();
        for (key, value) in vars {
            let key = key.into().trim().to_uppercase();
            let value = value.into().trim().to_string();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            present.insert(key, value);
        }

        let project_urls = present
            .iter()
            .filter(|(key, _)| {
                UrlKind::ALL.iter().any(|kind| {
                    key.strip_prefix(kind.prefix())
                        .is_some_and(|id| !id.is_empty())
                })
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let get = |key: &str| present.get(key).cloned();

        let timeout_secs = match get("BACKEND_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ExitError::Config(format!(
                    "BACKEND_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?,
            None => DEFAULT_BACKEND_TIMEOUT_SECS,
        };

        let llm = LlmSettings {
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_key: get("LLM_API_KEY"),
            base_url: get("LLM_BASE_URL"),
        };

        let backend = BackendSettings {
            url: get("BACKEND_URL")
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: get("BACKEND_API_KEY"),
            timeout: Duration::from_secs(timeout_secs),
        };

        let mcp = McpSettings {
            command: get("MCP_ATLASSIAN_COMMAND").unwrap_or_else(|| DEFAULT_MCP_COMMAND.to_string()),
            args: parse_args(&get("MCP_ATLASSIAN_ARGS").unwrap_or_else(|| DEFAULT_MCP_ARGS.to_string())),
        };

        let jira = credentials(&present, "JIRA");
        let confluence = credentials(&present, "CONFLUENCE");

        Ok(Self {
            project_urls,
            present,
            llm,
            backend,
            jira,
            confluence,
            mcp,
        })
    }

    /// Look up one reference URL for a normalized project identifier.
    pub fn lookup_url(&self, kind: UrlKind, identifier: &str) -> Option<&str> {
        self.project_urls
            .get(&kind.key_for(identifier))
            .map(String::as_str)
    }

    /// True when a repository URL is configured for the identifier.
    pub fn has_project(&self, identifier: &str) -> bool {
        self.lookup_url(UrlKind::Repository, identifier).is_some()
    }

    /// Every identifier that appears in at least one URL key, sorted.
    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .project_urls
            .keys()
            .filter_map(|key| {
                UrlKind::ALL
                    .iter()
                    .find_map(|kind| key.strip_prefix(kind.prefix()))
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Jira credential keys that are not set.
    pub fn missing_jira_keys(&self) -> Vec<String> {
        ["JIRA_URL", "JIRA_USERNAME", "JIRA_API_TOKEN"]
            .iter()
            .filter(|key| !self.present.contains_key(**key))
            .map(|key| (*key).to_string())
            .collect()
    }
}

/// Keep the entries that are valid Unicode. Anything else cannot be one of
/// our keys or a usable value.
fn unicode_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn credentials(present: &BTreeMap<String, String>, product: &str) -> Option<AtlassianCredentials> {
    let get = |suffix: &str| present.get(&format!("{product}_{suffix}")).cloned();
    Some(AtlassianCredentials {
        url: get("URL")?,
        username: get("USERNAME")?,
        api_token: get("API_TOKEN")?,
    })
}

/// Split launcher args: comma-separated when a comma is present, otherwise
/// whitespace-separated.
pub fn parse_args(raw: &str) -> Vec<String> {
    if raw.contains(',') {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        raw.split_whitespace().map(str::to_string).collect()
    }
}
