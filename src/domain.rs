use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorMode {
    #[default]
    Name,
    Cid,
    Smiles,
}

impl fmt::Display for DescriptorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorMode::Name => write!(f, "name"),
            DescriptorMode::Cid => write!(f, "cid"),
            DescriptorMode::Smiles => write!(f, "smiles"),
        }
    }
}

/// A user-supplied compound descriptor together with the way it must be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    value: String,
    mode: DescriptorMode,
}

impl Descriptor {
    pub fn new(value: &str, mode: DescriptorMode) -> Result<Self, HarvestError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(HarvestError::InvalidDescriptor(value.to_string()));
        }
        if mode == DescriptorMode::Cid && !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(HarvestError::InvalidDescriptor(format!(
                "{value} is not a PubChem CID"
            )));
        }
        Ok(Self {
            value: trimmed.to_string(),
            mode,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn mode(&self) -> DescriptorMode {
        self.mode
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compound {
    pub identifier: String,
    pub structure: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub identifier: String,
    pub structure: String,
}

impl ResultRow {
    pub fn new(identifier: impl Into<String>, structure: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            structure: structure.into(),
        }
    }
}

/// PubChem ListKey of a running substructure search. Not `Clone`: redeeming
/// a handle consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SearchHandle(String);

impl SearchHandle {
    pub fn new(list_key: impl Into<String>) -> Self {
        Self(list_key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
