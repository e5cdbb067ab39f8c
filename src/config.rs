use crate::env::Env;
use crate::error::{Error, Result};
use crate::overrides::{self, ConfigOverride};
use crate::provider::ModelProviderInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The configuration document, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: Option<String>,
    /// Provider id used when no profile or flag picks one.
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Local provider used in OSS mode: `ollama` or `lmstudio`.
    #[serde(default)]
    pub oss_provider: Option<String>,
    /// Profile applied when `--profile` is not given.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub model_providers: BTreeMap<String, ModelProviderInfo>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ConfigProfile>,
}

/// A named bundle of overrides selectable with `--profile`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConfigProfile {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    pub oss_provider: Option<String>,
}

/// Config home: `$CODEX_HOME`, else `$HOME/.codex`.
pub fn config_home(env: &dyn Env) -> PathBuf {
    if let Some(home) = env.non_blank("CODEX_HOME") {
        return PathBuf::from(home);
    }
    let home = env.non_blank("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join(".codex")
}

pub fn default_config_path(env: &dyn Env) -> PathBuf {
    config_home(env).join(CONFIG_FILE_NAME)
}

impl ConfigFile {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Load a config file and apply `-c` overrides on top of it.
    ///
    /// With `explicit = None` the default location is used and a missing file
    /// means an empty document. An explicit path must exist.
    pub fn load(
        explicit: Option<&Path>,
        cli_overrides: &[ConfigOverride],
        env: &dyn Env,
    ) -> Result<Self> {
        let raw = match explicit {
            Some(path) => read_table(path)?,
            None => {
                let path = default_config_path(env);
                if path.exists() {
                    read_table(&path)?
                } else {
                    debug!(path = %path.display(), "no config file, using built-in defaults");
                    toml::Table::new()
                }
            }
        };
        Self::from_table(raw, cli_overrides)
    }

    pub fn from_table(mut raw: toml::Table, cli_overrides: &[ConfigOverride]) -> Result<Self> {
        overrides::apply(&mut raw, cli_overrides)?;
        toml::Value::Table(raw)
            .try_into()
            .map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    pub fn profile(&self, name: &str) -> Result<&ConfigProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
    debug!(path = %path.display(), "loaded config file");
    content
        .parse::<toml::Table>()
        .map_err(|e| Error::config(format!("Failed to parse config {}: {e}", path.display())))
}
