//! Bootstrap configuration.
//!
//! ```toml
//! database = "app.db"
//! namespace = "app::model"
//!
//! [[sources]]
//! kind = "linked"
//!
//! [[sources]]
//! kind = "deployment"
//! path = "dist/app.zip"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::catalog::{
    DeploymentArchive, DescriptorArchive, DescriptorDirectory, LinkedTypes, TypeCatalog, TypeLoader,
};

/// Value of `database` selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Database and discovery settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database: String,
    /// Namespace that entity types are discovered under; empty means all.
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

/// Where candidate types are enumerated from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Linked,
    Directory { path: PathBuf },
    Archive { path: PathBuf },
    Deployment { path: PathBuf },
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig::Linked]
}

impl DbConfig {
    /// In-memory database discovering linked types under `namespace`.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self {
            database: IN_MEMORY.to_string(),
            namespace: namespace.into(),
            sources: default_sources(),
        }
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("invalid database configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration file {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("in {}", path.display()))
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }

    /// Type catalog over the configured sources, resolving against linked types.
    pub fn catalog(&self) -> TypeCatalog {
        let mut catalog = TypeCatalog::new(&self.namespace, TypeLoader::linked());
        for source in &self.sources {
            catalog = match source {
                SourceConfig::Linked => catalog.with_source(LinkedTypes),
                SourceConfig::Directory { path } => {
                    catalog.with_source(DescriptorDirectory::new(path))
                }
                SourceConfig::Archive { path } => catalog.with_source(DescriptorArchive::new(path)),
                SourceConfig::Deployment { path } => {
                    catalog.with_source(DeploymentArchive::new(path))
                }
            };
        }
        catalog
    }
}
