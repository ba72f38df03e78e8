//! Code lookup tables: a pair of indices (forward/reverse) built from a list
//! of source/target code pairs, generalised from the teacher's
//! `DatabaseTransformation`/`MappingValue` entities (which only ever
//! supported a single forward `HashMap<String, MappingValue>`) into the
//! bidirectional pair the specification requires.

use crate::utils::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMapping {
    pub source_code: String,
    pub target_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLookupTable {
    pub id: String,
    pub name: String,
    pub source_system: String,
    pub target_system: String,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target_code: Option<String>,
    pub mappings: Vec<CodeMapping>,

    #[serde(skip, default)]
    by_source: HashMap<String, CodeMapping>,
    #[serde(skip, default)]
    by_target: HashMap<String, CodeMapping>,
}

impl CodeLookupTable {
    /// Construct an unindexed table from its declarative fields; call
    /// [`CodeLookupTable::build`] before using it for lookups.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_system: impl Into<String>,
        target_system: impl Into<String>,
        bidirectional: bool,
        default_source_code: Option<String>,
        default_target_code: Option<String>,
        mappings: Vec<CodeMapping>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_system: source_system.into(),
            target_system: target_system.into(),
            bidirectional,
            default_source_code,
            default_target_code,
            mappings,
            by_source: HashMap::new(),
            by_target: HashMap::new(),
        }
    }

    /// Validate the §3 invariants and build the forward/reverse indices.
    /// `bySource` is always built; `byTarget` only when `bidirectional`.
    pub fn build(mut self) -> EngineResult<Self> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Config("lookup table id must not be empty".into()));
        }
        if self.mappings.is_empty() {
            return Err(EngineError::Config(format!(
                "lookup table '{}' has no mappings",
                self.id
            )));
        }

        let mut by_source = HashMap::with_capacity(self.mappings.len());
        let mut by_target = HashMap::with_capacity(self.mappings.len());

        for mapping in &self.mappings {
            if mapping.source_code.is_empty() || mapping.target_code.is_empty() {
                return Err(EngineError::Config(format!(
                    "lookup table '{}' has a mapping with an empty code",
                    self.id
                )));
            }
            if by_source.insert(mapping.source_code.clone(), mapping.clone()).is_some() {
                return Err(EngineError::Config(format!(
                    "lookup table '{}' has duplicate sourceCode '{}'",
                    self.id, mapping.source_code
                )));
            }
            if self.bidirectional
                && by_target.insert(mapping.target_code.clone(), mapping.clone()).is_some()
            {
                return Err(EngineError::Config(format!(
                    "lookup table '{}' is bidirectional but has duplicate targetCode '{}'",
                    self.id, mapping.target_code
                )));
            }
        }

        self.by_source = by_source;
        self.by_target = by_target;
        Ok(self)
    }

    /// `bySource[code]` else `defaultTargetCode` else `None`.
    pub fn lookup_target(&self, code: &str) -> Option<String> {
        self.by_source
            .get(code)
            .map(|m| m.target_code.clone())
            .or_else(|| self.default_target_code.clone())
    }

    /// Requires `bidirectional`; `byTarget[code]` else `defaultSourceCode` else `None`.
    pub fn lookup_source(&self, code: &str) -> EngineResult<Option<String>> {
        if !self.bidirectional {
            return Err(EngineError::NotBidirectional { table_id: self.id.clone() });
        }
        Ok(self
            .by_target
            .get(code)
            .map(|m| m.source_code.clone())
            .or_else(|| self.default_source_code.clone()))
    }

    pub fn display_for_target(&self, target_code: &str) -> Option<String> {
        self.by_target
            .get(target_code)
            .and_then(|m| m.display.clone())
            .or_else(|| {
                self.by_source
                    .values()
                    .find(|m| m.target_code == target_code)
                    .and_then(|m| m.display.clone())
            })
    }
}
