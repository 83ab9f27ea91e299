use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("descriptor not in database: {0}")]
    #[diagnostic(help("check the spelling or try another lookup mode (--name, --cid, --smiles)"))]
    NotFound(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid result limit: {0}")]
    InvalidLimit(String),

    #[error("substructure search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("substructure search did not complete after {attempts} attempts")]
    SearchTimedOut { attempts: u32 },

    #[error("search handle {0} was already redeemed")]
    HandleConsumed(String),

    #[error("origin structure {structure} of {identifier} is missing from the search results")]
    NormalizationMismatch {
        identifier: String,
        structure: String,
    },

    #[error("missing output directory {0}")]
    #[diagnostic(help("create the directory first, e.g. `mkdir ligand`"))]
    MissingOutputDir(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("PubChem request failed: {0}")]
    PubchemHttp(String),

    #[error("PubChem returned status {status}: {message}")]
    PubchemStatus { status: u16, message: String },

    #[error("ZINC request failed: {0}")]
    ZincHttp(String),

    #[error("ZINC returned status {status}: {message}")]
    ZincStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// How bad a failure is for the process as a whole. Later variants are worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureKind {
    /// Output directory, config or filesystem trouble.
    Setup,
    /// A descriptor or limit that can never succeed as typed.
    Input,
    /// Transport and protocol failures of the upstream searches.
    Search,
}

impl HarvestError {
    /// `None` for lookups that simply found nothing.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            HarvestError::NotFound(_) => None,
            HarvestError::InvalidDescriptor(_) | HarvestError::InvalidLimit(_) => {
                Some(FailureKind::Input)
            }
            HarvestError::SearchUnavailable(_)
            | HarvestError::SearchTimedOut { .. }
            | HarvestError::HandleConsumed(_)
            | HarvestError::NormalizationMismatch { .. }
            | HarvestError::PubchemHttp(_)
            | HarvestError::PubchemStatus { .. }
            | HarvestError::ZincHttp(_)
            | HarvestError::ZincStatus { .. } => Some(FailureKind::Search),
            HarvestError::MissingOutputDir(_)
            | HarvestError::ConfigRead(_)
            | HarvestError::ConfigParse(_)
            | HarvestError::Filesystem(_) => Some(FailureKind::Setup),
        }
    }
}
