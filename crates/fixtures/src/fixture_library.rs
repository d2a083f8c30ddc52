use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FixtureProfile, ProfileKind};

/// A named fixture model and the channel layout it speaks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureDefinition {
    pub id: String,
    pub manufacturer: String,
    pub model: String,
    pub kind: ProfileKind,
}

impl std::fmt::Display for FixtureDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.manufacturer, self.model, self.kind)
    }
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Failed to parse fixture library: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Default)]
pub struct FixtureLibrary {
    pub definitions: HashMap<String, FixtureDefinition>,
}

impl FixtureLibrary {
    pub fn new() -> Self {
        let mut library = FixtureLibrary::default();

        library.insert(FixtureDefinition {
            id: "generic-rgb".to_string(),
            manufacturer: "Generic".to_string(),
            model: "RGB Pixel".to_string(),
            kind: ProfileKind::Rgb,
        });
        // WS2811/WS2812 strips clock green first
        library.insert(FixtureDefinition {
            id: "ws2811-grb".to_string(),
            manufacturer: "Worldsemi".to_string(),
            model: "WS2811 Pixel".to_string(),
            kind: ProfileKind::Grb,
        });
        library.insert(FixtureDefinition {
            id: "sk6812-rgbw".to_string(),
            manufacturer: "Opsco".to_string(),
            model: "SK6812 RGBW Pixel".to_string(),
            kind: ProfileKind::Rgbw,
        });

        library
    }

    /// Built-in definitions plus the ones in a JSON array. Entries from JSON replace built-ins
    /// with the same id.
    pub fn from_json(json: &str) -> Result<Self, LibraryError> {
        let extra: Vec<FixtureDefinition> = serde_json::from_str(json)?;

        let mut library = Self::new();
        for definition in extra {
            library.insert(definition);
        }
        Ok(library)
    }

    pub fn insert(&mut self, definition: FixtureDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, id: &str) -> Option<&FixtureDefinition> {
        self.definitions.get(id)
    }

    /// A fresh profile for the definition `id`, falling back to parsing `id` as a bare layout name
    /// ("RGB", "GRB", "RGBW").
    pub fn profile(&self, id: &str) -> Option<FixtureProfile> {
        match self.get(id) {
            Some(definition) => Some(definition.kind.profile()),
            None => id.parse::<ProfileKind>().ok().map(|kind| kind.profile()),
        }
    }

    /// Definition ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.definitions.keys().map(|id| id.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}
