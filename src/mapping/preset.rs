use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::SelectorMap;
use crate::error::{Error, Result};

/// Column order the Ringy importer expects.
pub const RINGY_FIELD_ORDER: [&str; 6] = ["first_name", "last_name", "number", "city", "state", "zip_code"];

/// A pre-authored bundle of selectors for a known CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub container_selector: String,
    pub mappings: SelectorMap<String>,
    /// Fixed emission order for targets that import columns positionally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_order: Option<Vec<String>>,
}

/// Read-only collection of presets, keyed and ordered as defined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetLibrary {
    presets: SelectorMap<Preset>,
}

impl PresetLibrary {
    /// Load presets from a JSON file shaped `{ "<key>": { name, container_selector, mappings } }`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| Error::NotFound(format!("Preset file not found: {}", path.display())))?;

        let library = Self::from_json(&content)?;
        info!("Loaded {} presets from {}", library.len(), path.display());
        Ok(library)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mut library: PresetLibrary = serde_json::from_str(content)?;
        library.apply_known_orders();
        Ok(library)
    }

    /// Presets shipped with the binary, used when no preset file is configured.
    pub fn builtin() -> Self {
        let ringy = Preset {
            name: "Ringy CRM".to_string(),
            container_selector: "table.leads-table tbody tr".to_string(),
            mappings: [
                ("first_name", "td.first-name"),
                ("last_name", "td.last-name"),
                ("number", "td.phone"),
                ("city", "td.city"),
                ("state", "td.state"),
                ("zip_code", "td.zip"),
            ]
            .into_iter()
            .map(|(field, selector)| (field, selector.to_string()))
            .collect(),
            field_order: Some(RINGY_FIELD_ORDER.iter().map(|f| f.to_string()).collect()),
        };

        let generic_table = Preset {
            name: "Generic Table".to_string(),
            container_selector: "table tbody tr".to_string(),
            mappings: [
                ("name", "td:nth-child(1)"),
                ("email", "td:nth-child(2)"),
                ("phone", "td:nth-child(3)"),
                ("company", "td:nth-child(4)"),
            ]
            .into_iter()
            .map(|(field, selector)| (field, selector.to_string()))
            .collect(),
            field_order: None,
        };

        let mut presets = SelectorMap::new();
        presets.insert("ringy", ringy);
        presets.insert("generic_table", generic_table);
        Self { presets }
    }

    fn apply_known_orders(&mut self) {
        let mut updated = SelectorMap::new();
        for (key, mut preset) in std::mem::take(&mut self.presets) {
            if key == "ringy" && preset.field_order.is_none() {
                debug!("Applying fixed Ringy column order");
                preset.field_order = Some(RINGY_FIELD_ORDER.iter().map(|f| f.to_string()).collect());
            }
            updated.insert(key, preset);
        }
        self.presets = updated;
    }

    pub fn get(&self, key: &str) -> Option<&Preset> {
        self.presets.get(key)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Preset)> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
