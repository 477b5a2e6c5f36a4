//! Builder catalog
//!
//! Build plugins are opaque executables speaking the worker protocol. The
//! catalog resolves a builder id from project configuration to the concrete
//! command that launches it, plus the builder's declared protocol version
//! and default configuration.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no builder is registered for \"{0}\"")]
    UnknownBuilder(String),
}

/// Everything the supervisor needs to launch and talk to one builder.
#[derive(Debug, Clone)]
pub struct BuilderDescriptor {
    /// Builder package name, reported to the worker in build requests.
    pub name: String,
    /// Executable implementing the worker protocol.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `None` marks a builder predating the versioned-output protocol; its
    /// raw output map is wrapped by the normalizer.
    pub protocol_version: Option<u32>,
    /// Builder-declared default configuration, overridden per match.
    pub config: Map<String, Value>,
}

impl BuilderDescriptor {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            protocol_version: None,
            config: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = Some(version);
        self
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }
}

/// Resolves builder ids to descriptors.
pub trait BuilderCatalog: Send + Sync {
    fn resolve(&self, builder_id: &str) -> Result<BuilderDescriptor, CatalogError>;
}

/// Catalog backed by a fixed map, populated at startup.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    builders: HashMap<String, BuilderDescriptor>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builder_id: impl Into<String>, descriptor: BuilderDescriptor) {
        self.builders.insert(builder_id.into(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl BuilderCatalog for StaticCatalog {
    fn resolve(&self, builder_id: &str) -> Result<BuilderDescriptor, CatalogError> {
        self.builders
            .get(builder_id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownBuilder(builder_id.to_string()))
    }
}
