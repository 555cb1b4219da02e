use serde::Deserialize;

use crate::error::SynthError;
use crate::patch::Patch;

const FACTORY_PRESETS: &str = include_str!("factory_presets.json");

#[derive(Deserialize)]
struct PresetEntry {
    name: String,
    patch: Patch,
}

/// Named patches, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    presets: Vec<(String, Patch)>,
}

impl PresetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled factory bank. Each preset is validated like an import
    /// and its `meta.name` set to the preset name.
    pub fn factory() -> Result<Self, SynthError> {
        let entries: Vec<PresetEntry> = serde_json::from_str(FACTORY_PRESETS)?;
        let mut library = Self::new();
        for PresetEntry { name, mut patch } in entries {
            patch.validate()?;
            patch.sanitize()?;
            patch.performance.playing = false;
            patch.meta.name = name.clone();
            library.insert(name, patch);
        }
        Ok(library)
    }

    /// Add or replace a preset.
    pub fn insert(&mut self, name: impl Into<String>, patch: Patch) {
        let name = name.into();
        match self.presets.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = patch,
            None => self.presets.push((name, patch)),
        }
    }

    /// A copy of the named preset.
    pub fn get(&self, name: &str) -> Result<Patch, SynthError> {
        self.presets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, patch)| patch.clone())
            .ok_or_else(|| SynthError::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
