//! `-c key=value` overrides applied to the raw config document.
//!
//! Keys are dotted paths (`model_providers.azure.wire_api`). Values are read
//! as TOML and fall back to a literal string, so `-c model=o3` and
//! `-c 'model="o3"'` are equivalent.

use crate::error::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOverride {
    pub path: Vec<String>,
    pub value: toml::Value,
}

impl ConfigOverride {
    pub fn parse(raw: &str) -> Result<Self> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| Error::override_(format!("`{raw}` is not of the form key=value")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::override_(format!("`{raw}` has an empty key")));
        }
        let path: Vec<String> = key.split('.').map(|s| s.trim().to_string()).collect();
        if path.iter().any(String::is_empty) {
            return Err(Error::override_(format!("`{key}` has an empty path segment")));
        }
        Ok(Self {
            path,
            value: parse_value(value.trim()),
        })
    }

    pub fn key(&self) -> String {
        self.path.join(".")
    }
}

fn parse_value(raw: &str) -> toml::Value {
    let wrapped = format!("v = {raw}");
    match wrapped.parse::<toml::Table>() {
        Ok(mut table) => table
            .remove("v")
            .unwrap_or_else(|| toml::Value::String(raw.to_string())),
        Err(_) => toml::Value::String(raw.to_string()),
    }
}

/// Apply overrides in order; later ones win. Non-table values sitting on an
/// override's path are replaced by tables.
pub fn apply(root: &mut toml::Table, overrides: &[ConfigOverride]) -> Result<()> {
    for ov in overrides {
        debug!(key = %ov.key(), "applying config override");
        let Some((last, parents)) = ov.path.split_last() else {
            return Err(Error::override_("empty override path"));
        };
        let mut table = &mut *root;
        for segment in parents {
            let entry = table
                .entry(segment.clone())
                .or_insert(toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            table = entry
                .as_table_mut()
                .ok_or_else(|| Error::override_(format!("cannot descend into `{segment}`")))?;
        }
        table.insert(last.clone(), ov.value.clone());
    }
    Ok(())
}
