//! Metadata shared between compilation units.
//!
//! Every unit records the constructor-injected classes it generated factories
//! for, so downstream units can resolve those classes without their
//! declarations.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::warn;

use crate::binding::{BindingKind, FactoryRef};
use crate::graph::BindingGraph;
use crate::key::{ContextualTypeKey, TypeKey};
use crate::scope::ScopeAnnotation;

pub const METADATA_VERSION: u32 = 1;

/// A factory generated for a constructor-injected class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FactoryRecord {
    pub key: TypeKey,
    pub factory: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ContextualTypeKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeAnnotation>,
}

/// The metadata of one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleMetadata {
    pub version: u32,
    pub module: String,
    pub factories: Vec<FactoryRecord>,
}

impl ModuleMetadata {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            version: METADATA_VERSION,
            module: module.into(),
            factories: Vec::new(),
        }
    }

    /// Records every local constructor-injected binding of `graphs`.
    ///
    /// Assisted targets are skipped, as only their factory may create them.
    pub fn from_graphs<'g>(
        module: impl Into<String>,
        graphs: impl IntoIterator<Item = &'g BindingGraph>,
    ) -> Self {
        let mut factories = BTreeMap::new();
        for graph in graphs {
            for binding in graph.bindings() {
                let BindingKind::ConstructorInjected {
                    class,
                    factory: FactoryRef::Local,
                    assisted: false,
                } = binding.kind()
                else {
                    continue;
                };
                if let Entry::Vacant(entry) = factories.entry(binding.key().clone()) {
                    entry.insert(FactoryRecord {
                        key: binding.key().clone(),
                        factory: format!("{class}_Factory"),
                        dependencies: binding
                            .dependencies()
                            .iter()
                            .map(|dependency| dependency.request.clone())
                            .collect(),
                        scope: binding.lifetime().scope().cloned(),
                    });
                }
            }
        }
        Self {
            version: METADATA_VERSION,
            module: module.into(),
            factories: factories.into_values().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, MetadataError> {
        serde_json::to_string_pretty(self).context(MalformedSnafu)
    }

    /// Reads metadata written by [`ModuleMetadata::to_json`].
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be parsed, or was written with another
    /// metadata version.
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_str(json).context(MalformedSnafu)?;
        ensure!(
            metadata.version == METADATA_VERSION,
            UnsupportedVersionSnafu {
                found: metadata.version,
                expected: METADATA_VERSION,
            }
        );
        Ok(metadata)
    }
}

/// Every factory record loaded for the current compilation unit.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    records: HashMap<TypeKey, FactoryRecord>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the records of `module`. A key recorded by an earlier module keeps
    /// its first record.
    pub fn insert(&mut self, module: ModuleMetadata) {
        for record in module.factories {
            if let Some(existing) = self.records.get(&record.key) {
                warn!(
                    key = %record.key,
                    kept = %existing.factory,
                    ignored = %record.factory,
                    module = %module.module,
                    "ignored duplicate factory record"
                );
                continue;
            }
            self.records.insert(record.key.clone(), record);
        }
    }

    pub fn get(&self, key: &TypeKey) -> Option<&FactoryRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ModuleMetadata> for MetadataIndex {
    fn from_iter<T: IntoIterator<Item = ModuleMetadata>>(iter: T) -> Self {
        let mut index = Self::new();
        for module in iter {
            index.insert(module);
        }
        index
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum MetadataError {
    #[snafu(display("could not read or write module metadata"))]
    #[non_exhaustive]
    Malformed { source: serde_json::Error },
    #[snafu(display("module metadata has version {found}, expected {expected}"))]
    #[non_exhaustive]
    UnsupportedVersion { found: u32, expected: u32 },
}
