//! `extensions.yaml` manifests: named sections, each listing member files.
//!
//! ```yaml
//! telemetry:
//!   - blocks/Average.mon
//!   - blocks/Spread.mon
//! alerts:
//!   files: [blocks/Threshold.mon]
//! ```

use anyhow::{Context, Result};
use serde_yaml::Value;

use crate::model::RepositoryItem;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Document order; every section has at least one member.
    pub sections: Vec<Section>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(text).map_err(|e| match e.location() {
            Some(loc) => anyhow::anyhow!(
                "invalid manifest at line {}, column {}: {}",
                loc.line(),
                loc.column(),
                e
            ),
            None => anyhow::anyhow!("invalid manifest: {}", e),
        })?;
        let Value::Mapping(map) = doc else {
            anyhow::bail!("invalid manifest: top level must be a mapping of sections");
        };

        let mut sections = Vec::new();
        for (key, value) in map {
            let name = match key {
                Value::String(s) => s,
                other => serde_yaml::to_string(&other)
                    .context("section name")?
                    .trim()
                    .to_string(),
            };
            let members = members_of(&value);
            if members.is_empty() {
                tracing::warn!(section = %name, "ignoring manifest section without members");
                continue;
            }
            sections.push(Section { name, members });
        }
        Ok(Self { sections })
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }
}

fn members_of(value: &Value) -> Vec<String> {
    let list = match value {
        Value::Sequence(seq) => seq,
        Value::Mapping(map) => match map.get("files") {
            Some(Value::Sequence(seq)) => seq,
            _ => return Vec::new(),
        },
        Value::String(s) if !s.trim().is_empty() => return vec![s.trim().to_string()],
        _ => return Vec::new(),
    };
    list.iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One selectable item per section, each pointing back at the descriptor.
pub fn section_items(descriptor: &RepositoryItem, manifest: &Manifest) -> Vec<RepositoryItem> {
    manifest
        .sections
        .iter()
        .map(|section| RepositoryItem {
            id: Some(format!("{}#{}", descriptor.file, section.name)),
            name: section.name.clone(),
            section: Some(section.name.clone()),
            extensions_yaml_item: Some(Box::new(descriptor.clone())),
            ..descriptor.clone()
        })
        .collect()
}
