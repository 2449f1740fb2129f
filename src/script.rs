//! Loading scripts and inventories from JSON or YAML files.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use deckhand_actors::elb::Inventory;
use deckhand_core::{Error, Result};
use deckhand_engine::ActorSpec;

/// Document formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Detect the format of `path` from its extension.
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(Error::script_load(
                path.display().to_string(),
                "expected a .json, .yaml or .yml file",
            )),
        }
    }

    /// Parse `text` in this format.
    pub fn parse<T: DeserializeOwned>(self, text: &str, origin: &str) -> Result<T> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| Error::script_load(origin, e.to_string())),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| Error::script_load(origin, e.to_string())),
        }
    }
}

/// Read and parse any document.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = Format::detect(path)?;
    let origin = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| Error::script_load(&origin, e.to_string()))?;
    format.parse(&text, &origin)
}

/// Read the root actor spec of a script.
pub fn load_script(path: &Path) -> Result<ActorSpec> {
    load_document(path)
}

/// Read a load balancer inventory.
pub fn load_inventory(path: &Path) -> Result<Inventory> {
    load_document(path)
}
