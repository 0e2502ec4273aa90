use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Key of the baseline entry in a hallway visibility config.
pub const DEFAULT_STATE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultVisibility {
    #[serde(default)]
    pub visible: Vec<String>,
}

/// Mesh-name set operations for one scripted variant (`index<N>`).
///
/// `add` and `delete` stay optional so an entry that names neither can be told
/// apart from one that carries empty lists; the former resolves to the
/// baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Vec<String>>,
    #[serde(default)]
    pub conditional: Vec<String>,
}

impl VariantEntry {
    fn has_operations(&self) -> bool {
        self.add.is_some() || self.delete.is_some()
    }

    fn added(&self) -> impl Iterator<Item = &String> {
        self.add.iter().flatten()
    }

    fn deleted(&self) -> impl Iterator<Item = &String> {
        self.delete.iter().flatten()
    }
}

/// Parsed `hallwayVisibility.json`.
///
/// Only `index<N>` keys holding an object become variants; any other
/// top-level key (a version number, a comment) is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVisibilityConfig")]
pub struct VisibilityConfig {
    pub default: DefaultVisibility,
    #[serde(flatten)]
    pub variants: BTreeMap<String, VariantEntry>,
}

#[derive(Deserialize)]
struct RawVisibilityConfig {
    default: DefaultVisibility,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawVisibilityConfig> for VisibilityConfig {
    type Error = serde_json::Error;

    fn try_from(raw: RawVisibilityConfig) -> Result<Self, Self::Error> {
        let mut variants = BTreeMap::new();
        for (key, value) in raw.rest {
            let is_variant = key
                .strip_prefix("index")
                .is_some_and(|digits| digits.parse::<i32>().is_ok());
            if !is_variant || !value.is_object() {
                continue;
            }
            variants.insert(key, serde_json::from_value(value)?);
        }
        Ok(Self {
            default: raw.default,
            variants,
        })
    }
}

/// Maps a variant index to its config key; `-1` is the baseline.
pub fn variant_key(index: i32) -> String {
    if index == -1 {
        DEFAULT_STATE.to_string()
    } else {
        format!("index{index}")
    }
}

impl VisibilityConfig {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing visibility config JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading visibility config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("loading {}", path.display()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing visibility config")
    }

    /// Returns the key that will actually be applied for `state`. Unknown keys
    /// and entries without add/delete lists fall back to the baseline.
    pub fn resolve_state<'a>(&self, state: &'a str) -> &'a str {
        if state == DEFAULT_STATE {
            return DEFAULT_STATE;
        }
        match self.variants.get(state) {
            Some(entry) if entry.has_operations() => state,
            _ => DEFAULT_STATE,
        }
    }

    /// Computes the set of visible mesh names for `state`.
    ///
    /// The baseline universe is the default-visible list plus every name any
    /// variant deletes; a variant then adds its `add` list and removes its
    /// `delete` list, in that order.
    pub fn visible_set(&self, state: &str) -> BTreeSet<String> {
        let mut visible: BTreeSet<String> = self.default.visible.iter().cloned().collect();
        for entry in self.variants.values() {
            visible.extend(entry.deleted().cloned());
        }

        let resolved = self.resolve_state(state);
        if resolved != DEFAULT_STATE {
            if let Some(entry) = self.variants.get(resolved) {
                visible.extend(entry.added().cloned());
                for name in entry.deleted() {
                    visible.remove(name);
                }
            }
        }

        visible
    }

    /// Numeric indices of every `index<N>` entry, ascending.
    pub fn variant_indices(&self) -> Vec<i32> {
        let mut indices: Vec<i32> = self
            .variants
            .keys()
            .filter_map(|key| key.strip_prefix("index"))
            .filter_map(|digits| digits.parse().ok())
            .collect();
        indices.sort_unstable();
        indices
    }
}
