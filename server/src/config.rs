//! Configuration file loading and resolution.
//!
//! The TOML file mirrors [`ServerConfig`]; every section is optional. After
//! parsing, [`ServerConfig::resolve`] applies defaults and environment
//! overrides to produce the [`Settings`] the server runs with.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use adk_mcp_agents::{DEFAULT_MAX_LLM_CALLS, RunConfig};
use adk_mcp_providers::GEMINI_API_BASE_URL;
use adk_mcp_tools::search::DEFAULT_SEARCH_ENDPOINT;
use adk_mcp_tools::{GoogleSearchConfig, WebPageConfig};
use adk_mcp_types::DEFAULT_MODEL;
use serde::Deserialize;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "ADK_MCP_CONFIG";

const API_KEY_ENVS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];
const SEARCH_ENGINE_ENV: &str = "GOOGLE_CSE_ID";
const DEFAULT_MCP_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub api_keys: Option<ApiKeys>,
    pub google: Option<GoogleConfig>,
    pub search: Option<SearchConfig>,
    pub agents: Option<AgentsConfig>,
    pub webfetch: Option<WebFetchConfig>,
    pub mcp: Option<McpConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub google: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("google", &mask(self.google.as_ref()))
            .finish()
    }
}

fn mask(opt: Option<&String>) -> &'static str {
    if opt.is_some() { "[REDACTED]" } else { "None" }
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleConfig {
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchConfig {
    pub engine_id: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentsConfig {
    pub default_model: Option<String>,
    pub max_llm_calls: Option<usize>,
    pub max_tool_output_bytes: Option<usize>,
}

/// `load_web_page` fetch settings.
#[derive(Debug, Default, Deserialize)]
pub struct WebFetchConfig {
    pub timeout_seconds: Option<u64>,
    pub max_download_bytes: Option<usize>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct McpConfig {
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    pub file: Option<String>,
}

/// Replace `${VAR}` references with environment values; unset variables
/// become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

impl ServerConfig {
    /// Load from `$ADK_MCP_CONFIG`, else `~/.adk-mcp/config.toml`.
    ///
    /// A missing file is not an error and yields `None`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Apply defaults and environment overrides.
    #[must_use]
    pub fn resolve(self) -> Settings {
        self.resolve_with(|name| env::var(name).ok())
    }

    pub(crate) fn resolve_with(self, lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let non_blank = |value: String| {
            let value = expand_env_vars(value.trim());
            (!value.trim().is_empty()).then_some(value)
        };

        let google_api_key = API_KEY_ENVS
            .into_iter()
            .find_map(|name| lookup(name).and_then(non_blank))
            .or_else(|| self.api_keys.and_then(|k| k.google).and_then(non_blank));

        let google = self.google.unwrap_or_default();
        let search = self.search.unwrap_or_default();
        let agents = self.agents.unwrap_or_default();
        let webfetch = self.webfetch.unwrap_or_default();
        let mcp = self.mcp.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        let engine_id = lookup(SEARCH_ENGINE_ENV)
            .and_then(non_blank)
            .or_else(|| search.engine_id.and_then(non_blank));

        let web_defaults = WebPageConfig::default();
        let run_defaults = RunConfig::default();

        Settings {
            google_api_base: google
                .api_base
                .unwrap_or_else(|| GEMINI_API_BASE_URL.to_string()),
            search: GoogleSearchConfig {
                api_key: google_api_key.clone(),
                engine_id,
                endpoint: search
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_SEARCH_ENDPOINT.to_string()),
            },
            google_api_key,
            default_model: agents
                .default_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            run_config: RunConfig {
                max_llm_calls: agents.max_llm_calls.unwrap_or(DEFAULT_MAX_LLM_CALLS),
                max_tool_output_bytes: agents
                    .max_tool_output_bytes
                    .unwrap_or(run_defaults.max_tool_output_bytes),
            },
            webpage: WebPageConfig {
                timeout_seconds: webfetch
                    .timeout_seconds
                    .unwrap_or(web_defaults.timeout_seconds),
                max_download_bytes: webfetch
                    .max_download_bytes
                    .unwrap_or(web_defaults.max_download_bytes),
                user_agent: webfetch.user_agent.unwrap_or(web_defaults.user_agent),
            },
            mcp_request_timeout: Duration::from_secs(
                mcp.request_timeout_secs
                    .unwrap_or(DEFAULT_MCP_REQUEST_TIMEOUT_SECS),
            ),
            log_file: logging.file.map(|file| PathBuf::from(expand_env_vars(&file))),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_ENV)
        && !explicit.trim().is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".adk-mcp").join("config.toml"))
}

/// Resolved runtime settings.
#[derive(Clone)]
pub struct Settings {
    pub google_api_key: Option<String>,
    pub google_api_base: String,
    pub search: GoogleSearchConfig,
    pub default_model: String,
    pub run_config: RunConfig,
    pub webpage: WebPageConfig,
    pub mcp_request_timeout: Duration,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        ServerConfig::default().resolve_with(|_| None)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("google_api_key", &mask(self.google_api_key.as_ref()))
            .field("google_api_base", &self.google_api_base)
            .field("search", &self.search)
            .field("default_model", &self.default_model)
            .field("run_config", &self.run_config)
            .field("webpage", &self.webpage)
            .field("mcp_request_timeout", &self.mcp_request_timeout)
            .field("log_file", &self.log_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_mcp_tools::DEFAULT_MAX_OUTPUT_BYTES;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parse_empty_config() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert!(config.api_keys.is_none());
        assert!(config.agents.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[api_keys]
google = "AIza-test"

[google]
api_base = "http://localhost:9999/v1beta"

[search]
engine_id = "cx-1"
endpoint = "http://localhost:9999/customsearch/v1"

[agents]
default_model = "gemini-1.5-pro"
max_llm_calls = 20

[webfetch]
timeout_seconds = 5
max_download_bytes = 1024
user_agent = "test-agent"

[mcp]
request_timeout_secs = 7

[logging]
file = "/tmp/adk-mcp.log"
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        let settings = config.resolve_with(env_of(&[]));
        assert_eq!(settings.google_api_key.as_deref(), Some("AIza-test"));
        assert_eq!(settings.google_api_base, "http://localhost:9999/v1beta");
        assert_eq!(settings.search.api_key.as_deref(), Some("AIza-test"));
        assert_eq!(settings.search.engine_id.as_deref(), Some("cx-1"));
        assert_eq!(settings.default_model, "gemini-1.5-pro");
        assert_eq!(settings.run_config.max_llm_calls, 20);
        assert_eq!(settings.webpage.timeout_seconds, 5);
        assert_eq!(settings.webpage.max_download_bytes, 1024);
        assert_eq!(settings.webpage.user_agent, "test-agent");
        assert_eq!(settings.mcp_request_timeout, Duration::from_secs(7));
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/adk-mcp.log")));
    }

    #[test]
    fn defaults_without_config() {
        let settings = Settings::default();
        assert!(settings.google_api_key.is_none());
        assert_eq!(settings.google_api_base, GEMINI_API_BASE_URL);
        assert_eq!(settings.default_model, "gemini-2.0-flash");
        assert_eq!(settings.run_config.max_llm_calls, DEFAULT_MAX_LLM_CALLS);
        assert_eq!(
            settings.run_config.max_tool_output_bytes,
            DEFAULT_MAX_OUTPUT_BYTES
        );
        assert_eq!(settings.search.endpoint, DEFAULT_SEARCH_ENDPOINT);
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn environment_overrides_file() {
        let config: ServerConfig = toml::from_str(
            r#"
[api_keys]
google = "from-file"
[search]
engine_id = "file-cx"
"#,
        )
        .unwrap();
        let settings =
            config.resolve_with(env_of(&[("GEMINI_API_KEY", "from-env"), ("GOOGLE_CSE_ID", "env-cx")]));
        assert_eq!(settings.google_api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.search.engine_id.as_deref(), Some("env-cx"));
    }

    #[test]
    fn google_api_key_env_wins_over_gemini() {
        let settings = ServerConfig::default().resolve_with(env_of(&[
            ("GOOGLE_API_KEY", "google"),
            ("GEMINI_API_KEY", "gemini"),
        ]));
        assert_eq!(settings.google_api_key.as_deref(), Some("google"));
    }

    #[test]
    fn blank_keys_are_ignored() {
        let config: ServerConfig = toml::from_str("[api_keys]\ngoogle = \"  \"").unwrap();
        let settings = config.resolve_with(env_of(&[("GOOGLE_API_KEY", "")]));
        assert!(settings.google_api_key.is_none());
    }

    #[test]
    fn settings_debug_redacts_key() {
        let settings = ServerConfig::default().resolve_with(env_of(&[("GOOGLE_API_KEY", "AIzaSecret")]));
        let debug = format!("{settings:?}");
        assert!(!debug.contains("AIzaSecret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn api_keys_debug_shows_none() {
        let debug = format!("{:?}", ApiKeys::default());
        assert!(debug.contains("None"));
        assert!(!debug.contains("[REDACTED]"));
    }

    #[test]
    fn expand_env_vars_leaves_plain_text() {
        assert_eq!(expand_env_vars("plain"), "plain");
        assert_eq!(expand_env_vars("open ${ brace"), "open ${ brace");
        assert_eq!(expand_env_vars("${}"), "${}");
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agents]\nmax_llm_calls = 4\n").unwrap();
        let config = ServerConfig::load_from(&path).unwrap().unwrap();
        assert_eq!(config.agents.unwrap().max_llm_calls, Some(4));
    }

    #[test]
    fn load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agents\nmax_llm_calls = ").unwrap();
        let err = ServerConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }
}
