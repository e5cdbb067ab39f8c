//! Resolution of the effective provider and model.
//!
//! Precedence, highest first: CLI flags, the active profile, top-level
//! config keys (including `-c` overrides, which patch the document), then
//! built-in defaults.

use crate::config::{ConfigFile, ConfigProfile};
use crate::env::Env;
use crate::error::{Error, Result};
use crate::provider::{
    LMSTUDIO_PROVIDER_ID, ModelProviderInfo, OLLAMA_PROVIDER_ID, OPENAI_PROVIDER_ID,
};
use crate::registry::ProviderRegistry;
use tracing::info;

pub const DEFAULT_MODEL: &str = "gpt-5-codex";
pub const DEFAULT_OSS_MODEL: &str = "gpt-oss:20b";
pub const LOCAL_PROVIDERS: &[&str] = &[OLLAMA_PROVIDER_ID, LMSTUDIO_PROVIDER_ID];

/// Flags that override the config document for a single invocation.
#[derive(Debug, Clone, Default)]
pub struct CliOverlay {
    /// `--oss`: use a local open-source provider.
    pub oss: bool,
    /// `--local-provider <name>`; implies `--oss`.
    pub local_provider: Option<String>,
    /// `-m/--model`.
    pub model: Option<String>,
    /// `-p/--profile`.
    pub profile: Option<String>,
}

impl CliOverlay {
    pub fn oss_mode(&self) -> bool {
        self.oss || self.local_provider.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub provider_id: String,
    pub provider: ModelProviderInfo,
    pub model: String,
    pub profile: Option<String>,
    pub oss: bool,
}

pub fn resolve(config: &ConfigFile, overlay: &CliOverlay, env: &dyn Env) -> Result<Selection> {
    let registry = ProviderRegistry::from_config(config, env)?;
    resolve_with_registry(config, &registry, overlay)
}

pub fn resolve_with_registry(
    config: &ConfigFile,
    registry: &ProviderRegistry,
    overlay: &CliOverlay,
) -> Result<Selection> {
    let profile_name = overlay.profile.clone().or_else(|| config.profile.clone());
    let profile = match &profile_name {
        Some(name) => Some(config.profile(name)?),
        None => None,
    };

    let oss = overlay.oss_mode();
    let provider_id = if oss {
        local_provider_id(config, profile, overlay)?
    } else {
        profile
            .and_then(|p| p.model_provider.clone())
            .or_else(|| config.model_provider.clone())
            .unwrap_or_else(|| OPENAI_PROVIDER_ID.to_string())
    };
    let provider = registry.get(&provider_id)?.clone();

    let model = overlay
        .model
        .clone()
        .or_else(|| profile.and_then(|p| p.model.clone()))
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| {
            if oss {
                DEFAULT_OSS_MODEL.to_string()
            } else {
                DEFAULT_MODEL.to_string()
            }
        });

    info!(
        provider = %provider_id,
        model = %model,
        profile = profile_name.as_deref().unwrap_or("-"),
        oss,
        "resolved model provider"
    );

    Ok(Selection {
        provider_id,
        provider,
        model,
        profile: profile_name,
        oss,
    })
}

fn local_provider_id(
    config: &ConfigFile,
    profile: Option<&ConfigProfile>,
    overlay: &CliOverlay,
) -> Result<String> {
    let id = overlay
        .local_provider
        .clone()
        .or_else(|| profile.and_then(|p| p.oss_provider.clone()))
        .or_else(|| config.oss_provider.clone())
        .unwrap_or_else(|| OLLAMA_PROVIDER_ID.to_string());
    if LOCAL_PROVIDERS.contains(&id.as_str()) {
        Ok(id)
    } else {
        Err(Error::UnknownLocalProvider(id))
    }
}
