use crate::config::ConfigFile;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::provider::{ModelProviderInfo, built_in_model_providers};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Provider id → connection settings. Built-in entries first, then the
/// user's `model_providers`. Built-in ids cannot be redefined.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ModelProviderInfo>,
}

impl ProviderRegistry {
    pub fn built_in(env: &dyn Env) -> Self {
        Self {
            providers: built_in_model_providers(env),
        }
    }

    pub fn from_config(config: &ConfigFile, env: &dyn Env) -> Result<Self> {
        let mut registry = Self::built_in(env);
        for (id, provider) in &config.model_providers {
            registry.insert_user(id, provider.clone())?;
        }
        Ok(registry)
    }

    fn insert_user(&mut self, id: &str, provider: ModelProviderInfo) -> Result<()> {
        if self.providers.contains_key(id) {
            warn!(provider = id, "ignoring user definition of a built-in provider");
            return Ok(());
        }
        if provider
            .base_url
            .as_deref()
            .is_none_or(|u| u.trim().is_empty())
        {
            return Err(Error::config(format!(
                "model_providers.{id}: base_url is required"
            )));
        }
        debug!(provider = id, base_url = ?provider.base_url, "registered provider");
        self.providers.insert(id.to_string(), provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&ModelProviderInfo> {
        self.providers.get(id).ok_or_else(|| Error::ProviderNotFound {
            id: id.to_string(),
            available: self.ids(),
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelProviderInfo)> {
        self.providers.iter().map(|(k, v)| (k.as_str(), v))
    }
}
