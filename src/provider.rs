//! Model provider records and the built-in provider set.
//!
//! A provider is a named set of connection settings for an OpenAI-compatible
//! endpoint. Built-in entries are created here; user entries come from the
//! `model_providers` table of the config file (see [`crate::registry`]).

use crate::env::Env;
use crate::error::{Error, Result};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_REQUEST_MAX_RETRIES: u64 = 4;
pub const DEFAULT_STREAM_MAX_RETRIES: u64 = 5;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 300_000;
/// Upper bound applied to user-configured retry counts.
pub const MAX_RETRIES_CAP: u64 = 100;

pub const OPENAI_PROVIDER_ID: &str = "openai";
pub const OLLAMA_PROVIDER_ID: &str = "ollama";
pub const LMSTUDIO_PROVIDER_ID: &str = "lmstudio";

pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const DEFAULT_LMSTUDIO_PORT: u16 = 1234;

const OPENAI_PROVIDER_NAME: &str = "OpenAI";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Request/response protocol flavor a provider expects. The two cannot be
/// detected at runtime, so each provider declares one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireApi {
    /// Chat Completions, `/chat/completions`.
    #[default]
    Chat,
    /// Responses, `/responses`.
    Responses,
}

impl WireApi {
    pub fn endpoint_path(self) -> &'static str {
        match self {
            Self::Chat => "chat/completions",
            Self::Responses => "responses",
        }
    }
}

impl std::fmt::Display for WireApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Responses => write!(f, "responses"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelProviderInfo {
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
    /// Help text shown when `env_key` is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_key_instructions: Option<String>,
    /// Static bearer token. Prefer `env_key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental_bearer_token: Option<String>,
    #[serde(default)]
    pub requires_openai_auth: bool,
    #[serde(default)]
    pub wire_api: WireApi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_headers: Option<BTreeMap<String, String>>,
    /// Header name → environment variable supplying its value. Headers whose
    /// variable is unset or blank are omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_http_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_max_retries: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_max_retries: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_idle_timeout_ms: Option<u64>,
}

/// Where a resolved bearer credential came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    BearerToken,
    EnvKey(String),
    OpenAiApiKey,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BearerToken => write!(f, "experimental_bearer_token"),
            Self::EnvKey(var) => write!(f, "env:{var}"),
            Self::OpenAiApiKey => write!(f, "env:{OPENAI_API_KEY_ENV}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

impl ModelProviderInfo {
    /// A provider with only a name and base URL; every other field defaulted.
    pub fn new(name: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            name: name.into(),
            base_url,
            env_key: None,
            env_key_instructions: None,
            experimental_bearer_token: None,
            requires_openai_auth: false,
            wire_api: WireApi::default(),
            query_params: None,
            http_headers: None,
            env_http_headers: None,
            request_max_retries: None,
            stream_max_retries: None,
            stream_idle_timeout_ms: None,
        }
    }

    pub fn request_max_retries(&self) -> u64 {
        self.request_max_retries
            .unwrap_or(DEFAULT_REQUEST_MAX_RETRIES)
            .min(MAX_RETRIES_CAP)
    }

    pub fn stream_max_retries(&self) -> u64 {
        self.stream_max_retries
            .unwrap_or(DEFAULT_STREAM_MAX_RETRIES)
            .min(MAX_RETRIES_CAP)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(
            self.stream_idle_timeout_ms
                .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_MS),
        )
    }

    pub fn is_openai(&self) -> bool {
        self.name == OPENAI_PROVIDER_NAME
    }

    /// Configured base URL without a trailing slash, or the OpenAI default.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(OPENAI_DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// `{base_url}/{path}` with `query_params` appended in key order.
    pub fn endpoint_url(&self, path: &str) -> Result<String> {
        let joined = format!(
            "{}/{}",
            self.effective_base_url(),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| Error::config(format!("invalid base_url for {}: {e}", self.name)))?;
        if let Some(params) = self.query_params.as_ref().filter(|p| !p.is_empty()) {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url.to_string())
    }

    /// URL of the endpoint matching this provider's wire API.
    pub fn wire_endpoint_url(&self) -> Result<String> {
        self.endpoint_url(self.wire_api.endpoint_path())
    }

    /// API key from `env_key`, if one is configured. A configured but unset
    /// (or blank) variable is an error carrying `env_key_instructions`.
    pub fn api_key(&self, env: &dyn Env) -> Result<Option<String>> {
        match &self.env_key {
            Some(var) => env
                .non_blank(var)
                .map(Some)
                .ok_or_else(|| Error::MissingEnvVar {
                    var: var.clone(),
                    instructions: self.env_key_instructions.clone(),
                }),
            None => Ok(None),
        }
    }

    /// Bearer credential in precedence order: static token, `env_key`,
    /// then `OPENAI_API_KEY` for providers that require OpenAI auth.
    pub fn credential(&self, env: &dyn Env) -> Result<Option<Credential>> {
        if let Some(token) = self
            .experimental_bearer_token
            .as_ref()
            .filter(|t| !t.trim().is_empty())
        {
            return Ok(Some(Credential {
                value: token.clone(),
                source: CredentialSource::BearerToken,
            }));
        }
        if let Some(key) = self.api_key(env)? {
            let var = self.env_key.clone().unwrap_or_default();
            return Ok(Some(Credential {
                value: key,
                source: CredentialSource::EnvKey(var),
            }));
        }
        if self.requires_openai_auth {
            return Ok(env.non_blank(OPENAI_API_KEY_ENV).map(|value| Credential {
                value,
                source: CredentialSource::OpenAiApiKey,
            }));
        }
        Ok(None)
    }

    /// Static `http_headers` followed by `env_http_headers` whose variable is
    /// set. Entries that are not valid header names or values are skipped.
    pub fn headers(&self, env: &dyn Env) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(extra) = &self.http_headers {
            for (k, v) in extra {
                insert_header(&mut headers, &self.name, k, v);
            }
        }
        if let Some(env_headers) = &self.env_http_headers {
            for (k, var) in env_headers {
                if let Some(v) = env.non_blank(var) {
                    insert_header(&mut headers, &self.name, k, &v);
                }
            }
        }
        headers
    }
}

fn insert_header(headers: &mut HeaderMap, provider: &str, name: &str, value: &str) {
    match (
        HeaderName::try_from(name),
        HeaderValue::try_from(value.trim()),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(provider, header = name, "skipping invalid HTTP header"),
    }
}

/// The built-in OpenAI provider. `OPENAI_BASE_URL` replaces the default
/// endpoint; organization and project headers come from the environment.
pub fn create_openai_provider(env: &dyn Env) -> ModelProviderInfo {
    ModelProviderInfo {
        base_url: env.non_blank("OPENAI_BASE_URL"),
        requires_openai_auth: true,
        wire_api: WireApi::Responses,
        http_headers: Some(BTreeMap::from([(
            "version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        )])),
        env_http_headers: Some(BTreeMap::from([
            (
                "OpenAI-Organization".to_string(),
                "OPENAI_ORGANIZATION".to_string(),
            ),
            ("OpenAI-Project".to_string(), "OPENAI_PROJECT".to_string()),
        ])),
        ..ModelProviderInfo::new(OPENAI_PROVIDER_NAME, None)
    }
}

/// A local open-source provider. `CODEX_OSS_BASE_URL` wins outright;
/// otherwise `CODEX_OSS_PORT` (when numeric) replaces the default port.
pub fn create_oss_provider(env: &dyn Env, default_port: u16, wire_api: WireApi) -> ModelProviderInfo {
    let base_url = env.non_blank("CODEX_OSS_BASE_URL").unwrap_or_else(|| {
        let port = env
            .non_blank("CODEX_OSS_PORT")
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(default_port);
        format!("http://localhost:{port}/v1")
    });
    create_oss_provider_with_base_url(&base_url, wire_api)
}

pub fn create_oss_provider_with_base_url(base_url: &str, wire_api: WireApi) -> ModelProviderInfo {
    ModelProviderInfo {
        wire_api,
        ..ModelProviderInfo::new("gpt-oss", Some(base_url.to_string()))
    }
}

/// Providers available without any configuration.
pub fn built_in_model_providers(env: &dyn Env) -> BTreeMap<String, ModelProviderInfo> {
    BTreeMap::from([
        (OPENAI_PROVIDER_ID.to_string(), create_openai_provider(env)),
        (
            OLLAMA_PROVIDER_ID.to_string(),
            create_oss_provider(env, DEFAULT_OLLAMA_PORT, WireApi::Chat),
        ),
        (
            LMSTUDIO_PROVIDER_ID.to_string(),
            create_oss_provider(env, DEFAULT_LMSTUDIO_PORT, WireApi::Responses),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn minimal_provider_uses_documented_defaults() {
        let provider: ModelProviderInfo = toml::from_str(
            r#"
name = "Ollama"
base_url = "http://localhost:11434/v1"
"#,
        )
        .unwrap();
        assert_eq!(
            provider,
            ModelProviderInfo::new("Ollama", Some("http://localhost:11434/v1".into()))
        );
        assert_eq!(provider.wire_api, WireApi::Chat);
        assert!(!provider.requires_openai_auth);
        assert_eq!(provider.request_max_retries(), 4);
        assert_eq!(provider.stream_max_retries(), 5);
        assert_eq!(provider.stream_idle_timeout(), Duration::from_millis(300_000));
    }

    #[test]
    fn azure_provider_parses_query_params() {
        let provider: ModelProviderInfo = toml::from_str(
            r#"
name = "Azure"
base_url = "https://acme.openai.azure.com/openai"
env_key = "AZURE_OPENAI_API_KEY"
wire_api = "responses"
query_params = { api-version = "2025-04-01-preview" }
"#,
        )
        .unwrap();
        assert_eq!(provider.env_key.as_deref(), Some("AZURE_OPENAI_API_KEY"));
        assert_eq!(provider.wire_api, WireApi::Responses);
        assert_eq!(
            provider.wire_endpoint_url().unwrap(),
            "https://acme.openai.azure.com/openai/responses?api-version=2025-04-01-preview"
        );
    }

    #[test]
    fn unknown_wire_api_is_rejected() {
        let result: std::result::Result<ModelProviderInfo, _> = toml::from_str(
            r#"
name = "Bad"
base_url = "http://localhost/v1"
wire_api = "grpc"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn retries_are_capped() {
        let mut provider = ModelProviderInfo::new("x", Some("http://localhost/v1".into()));
        provider.request_max_retries = Some(1_000);
        provider.stream_max_retries = Some(7);
        assert_eq!(provider.request_max_retries(), MAX_RETRIES_CAP);
        assert_eq!(provider.stream_max_retries(), 7);
    }

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        let provider = ModelProviderInfo::new("x", Some("http://localhost:8080/v1/".into()));
        assert_eq!(
            provider.endpoint_url("/models").unwrap(),
            "http://localhost:8080/v1/models"
        );
        assert_eq!(
            provider.wire_endpoint_url().unwrap(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn api_key_requires_non_blank_env_var() {
        let mut provider = ModelProviderInfo::new("Acme", Some("https://acme.example/v1".into()));
        provider.env_key = Some("ACME_KEY".into());
        provider.env_key_instructions = Some("Get one from the dashboard".into());

        let err = provider.api_key(&env(&[("ACME_KEY", "  ")])).unwrap_err();
        match err {
            Error::MissingEnvVar { var, instructions } => {
                assert_eq!(var, "ACME_KEY");
                assert_eq!(instructions.as_deref(), Some("Get one from the dashboard"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let key = provider.api_key(&env(&[("ACME_KEY", "sk-acme")])).unwrap();
        assert_eq!(key.as_deref(), Some("sk-acme"));
    }

    #[test]
    fn credential_precedence() {
        let mut provider = ModelProviderInfo::new("Acme", Some("https://acme.example/v1".into()));
        provider.requires_openai_auth = true;
        let vars = env(&[("ACME_KEY", "from-env-key"), ("OPENAI_API_KEY", "from-openai")]);

        let cred = provider.credential(&vars).unwrap().unwrap();
        assert_eq!(cred.source, CredentialSource::OpenAiApiKey);
        assert_eq!(cred.value, "from-openai");

        provider.env_key = Some("ACME_KEY".into());
        let cred = provider.credential(&vars).unwrap().unwrap();
        assert_eq!(cred.source, CredentialSource::EnvKey("ACME_KEY".into()));

        provider.experimental_bearer_token = Some("static".into());
        let cred = provider.credential(&vars).unwrap().unwrap();
        assert_eq!(cred.source, CredentialSource::BearerToken);
        assert_eq!(cred.value, "static");
    }

    #[test]
    fn no_credential_when_nothing_configured() {
        let provider = ModelProviderInfo::new("Local", Some("http://localhost/v1".into()));
        assert!(provider.credential(&env(&[])).unwrap().is_none());
    }

    #[test]
    fn headers_skip_unset_env_and_invalid_names() {
        let mut provider = ModelProviderInfo::new("x", Some("http://localhost/v1".into()));
        provider.http_headers = Some(BTreeMap::from([
            ("X-Static".to_string(), "static".to_string()),
            ("bad header".to_string(), "dropped".to_string()),
        ]));
        provider.env_http_headers = Some(BTreeMap::from([
            ("X-From-Env".to_string(), "HEADER_VAR".to_string()),
            ("X-Missing".to_string(), "MISSING_VAR".to_string()),
            ("X-Blank".to_string(), "BLANK_VAR".to_string()),
        ]));

        let headers = provider.headers(&env(&[("HEADER_VAR", "env-value"), ("BLANK_VAR", " ")]));
        assert_eq!(headers.get("x-static").unwrap(), "static");
        assert_eq!(headers.get("x-from-env").unwrap(), "env-value");
        assert!(headers.get("x-missing").is_none());
        assert!(headers.get("x-blank").is_none());
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn openai_builtin_reads_env() {
        let vars = env(&[
            ("OPENAI_BASE_URL", "https://proxy.example/v1"),
            ("OPENAI_ORGANIZATION", "org-123"),
        ]);
        let provider = create_openai_provider(&vars);
        assert!(provider.is_openai());
        assert!(provider.requires_openai_auth);
        assert_eq!(provider.wire_api, WireApi::Responses);
        assert_eq!(provider.effective_base_url(), "https://proxy.example/v1");

        let headers = provider.headers(&vars);
        assert_eq!(headers.get("openai-organization").unwrap(), "org-123");
        assert!(headers.get("openai-project").is_none());
        assert!(headers.get("version").is_some());
    }

    #[test]
    fn openai_builtin_ignores_blank_base_url() {
        let provider = create_openai_provider(&env(&[("OPENAI_BASE_URL", "")]));
        assert_eq!(provider.base_url, None);
        assert_eq!(provider.effective_base_url(), OPENAI_DEFAULT_BASE_URL);
    }

    #[test]
    fn oss_base_url_resolution() {
        let default = create_oss_provider(&env(&[]), DEFAULT_OLLAMA_PORT, WireApi::Chat);
        assert_eq!(default.base_url.as_deref(), Some("http://localhost:11434/v1"));

        let port = create_oss_provider(&env(&[("CODEX_OSS_PORT", "9999")]), DEFAULT_OLLAMA_PORT, WireApi::Chat);
        assert_eq!(port.base_url.as_deref(), Some("http://localhost:9999/v1"));

        let bad_port = create_oss_provider(
            &env(&[("CODEX_OSS_PORT", "not-a-port")]),
            DEFAULT_LMSTUDIO_PORT,
            WireApi::Responses,
        );
        assert_eq!(bad_port.base_url.as_deref(), Some("http://localhost:1234/v1"));

        let full = create_oss_provider(
            &env(&[
                ("CODEX_OSS_BASE_URL", "http://gpu-box:11434/v1"),
                ("CODEX_OSS_PORT", "9999"),
            ]),
            DEFAULT_OLLAMA_PORT,
            WireApi::Chat,
        );
        assert_eq!(full.base_url.as_deref(), Some("http://gpu-box:11434/v1"));
    }

    #[test]
    fn builtins_cover_openai_and_local_providers() {
        let providers = built_in_model_providers(&env(&[]));
        let ids: Vec<_> = providers.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["lmstudio", "ollama", "openai"]);
        assert_eq!(providers["ollama"].wire_api, WireApi::Chat);
        assert_eq!(providers["lmstudio"].wire_api, WireApi::Responses);
    }
}
