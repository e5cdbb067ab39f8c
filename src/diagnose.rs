//! Checks for the common misconfigurations of a resolved selection.

use crate::env::Env;
use crate::error::Error;
use crate::provider::WireApi;
use crate::selection::Selection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    /// Stable identifier, e.g. `missing-api-key`.
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn new(level: Level, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            code,
            message: message.into(),
        }
    }
}

const AZURE_HOST_MARKERS: &[&str] = &[
    "openai.azure.",
    "cognitiveservices.azure.",
    "aoai.azure.",
    "openai.azure-api.",
];

/// Diagnostics sorted by severity, errors first.
pub fn diagnose(selection: &Selection, env: &dyn Env) -> Vec<Diagnostic> {
    let provider = &selection.provider;
    let mut out = Vec::new();

    match provider.credential(env) {
        Err(Error::MissingEnvVar { var, instructions }) => {
            let mut message = format!(
                "provider `{}` reads its API key from `{var}`, which is not set",
                selection.provider_id
            );
            if let Some(help) = instructions {
                message.push_str(&format!(". {help}"));
            }
            out.push(Diagnostic::new(Level::Error, "missing-api-key", message));
        }
        Err(e) => out.push(Diagnostic::new(Level::Error, "credential", e.to_string())),
        Ok(None) if provider.requires_openai_auth => out.push(Diagnostic::new(
            Level::Warning,
            "openai-auth",
            format!(
                "provider `{}` requires OpenAI auth; set OPENAI_API_KEY or log in with the agent",
                selection.provider_id
            ),
        )),
        Ok(_) => {}
    }

    if provider.wire_api == WireApi::Chat && selection.model.contains("codex") {
        out.push(Diagnostic::new(
            Level::Warning,
            "wire-api-mismatch",
            format!(
                "model `{}` is served over the responses API but provider `{}` uses wire_api = \"chat\"",
                selection.model, selection.provider_id
            ),
        ));
    }

    if provider.wire_api == WireApi::Chat {
        out.push(Diagnostic::new(
            Level::Info,
            "chat-deprecated",
            format!(
                "provider `{}` uses the chat wire API; prefer wire_api = \"responses\" where the endpoint supports it",
                selection.provider_id
            ),
        ));
    }

    let base_url = provider.effective_base_url();
    if let Some(suffix) = ["/chat/completions", "/responses"]
        .into_iter()
        .find(|s| base_url.ends_with(s))
    {
        out.push(Diagnostic::new(
            Level::Warning,
            "endpoint-in-base-url",
            format!("base_url `{base_url}` already ends in `{suffix}`; the endpoint path is appended automatically"),
        ));
    }

    let lower = base_url.to_ascii_lowercase();
    let has_api_version = provider
        .query_params
        .as_ref()
        .is_some_and(|q| q.contains_key("api-version"));
    if AZURE_HOST_MARKERS.iter().any(|m| lower.contains(m)) && !has_api_version {
        out.push(Diagnostic::new(
            Level::Warning,
            "azure-api-version",
            "Azure endpoints need query_params = { api-version = \"...\" }",
        ));
    }

    out.sort_by_key(|d| d.level);
    out
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.level == Level::Error)
}
