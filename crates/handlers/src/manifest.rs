// SPDX-License-Identifier: MIT

//! `HandlerManifest`: the metadata a handler carries, loaded either from
//! the Rust registration (defaults) or overridden by a `*.toml` file on
//! disk, per `handlers.c`'s `handler_import` metadata table.

use ldrepl_cache::SearchFilter;
use serde::Deserialize;

fn default_priority() -> f64 {
    50.0
}

/// On-disk override for one handler's metadata. `description` is the only
/// required field: its absence aborts the load.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFile {
    pub description: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default)]
    pub modrdn: bool,
    #[serde(default)]
    pub handle_every_delete: bool,
}

#[derive(Debug, Clone)]
pub struct HandlerManifest {
    pub name: String,
    pub description: String,
    pub filter: Option<SearchFilter>,
    pub attributes: Vec<String>,
    pub priority: f64,
    pub modrdn: bool,
    pub handle_every_delete: bool,
}

impl HandlerManifest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            filter: None,
            attributes: Vec::new(),
            priority: default_priority(),
            modrdn: false,
            handle_every_delete: false,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = String>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    pub fn with_modrdn(mut self, modrdn: bool) -> Self {
        self.modrdn = modrdn;
        self
    }

    pub fn with_handle_every_delete(mut self, handle_every_delete: bool) -> Self {
        self.handle_every_delete = handle_every_delete;
        self
    }

    pub fn is_replication(&self) -> bool {
        self.name == "replication"
    }

    /// Apply a parsed manifest file's overrides on top of this manifest's
    /// Rust-side defaults.
    pub fn apply_override(&mut self, file: ManifestFile) {
        self.description = file.description;
        self.filter = file.filter.map(SearchFilter::new);
        self.attributes = file.attributes;
        self.priority = file.priority;
        self.modrdn = file.modrdn;
        self.handle_every_delete = file.handle_every_delete;
    }
}
