use std::fs;
use std::io::Write;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ResultRow;
use crate::error::HarvestError;
use crate::normalize::CanonicalTable;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\s/\\:*?"<>|]+"#).expect("file name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every file directly in the output directory.
    #[default]
    Flat,
    /// One sub-directory per compound.
    Nested,
}

/// Per-source file budget. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub pubchem: Option<usize>,
    pub zinc: Option<usize>,
}

impl Quota {
    /// Splits `limit` evenly between the sources. The PubChem share counts the
    /// origin file, which is always written.
    pub fn split(limit: Option<usize>, zinc_enabled: bool) -> Self {
        match limit {
            None => Self {
                pubchem: None,
                zinc: None,
            },
            Some(max) if zinc_enabled => Self {
                pubchem: Some((max / 2).max(1)),
                zinc: Some(max / 2),
            },
            Some(max) => Self {
                pubchem: Some(max.max(1)),
                zinc: Some(0),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WrittenFiles {
    pub structures: Vec<Utf8PathBuf>,
    pub tables: Vec<Utf8PathBuf>,
}

pub struct Materializer {
    root: Utf8PathBuf,
    layout: Layout,
}

impl Materializer {
    /// The output directory must already exist.
    pub fn new(root: Utf8PathBuf, layout: Layout) -> Result<Self, HarvestError> {
        if !root.as_std_path().is_dir() {
            return Err(HarvestError::MissingOutputDir(root.into_std_path_buf()));
        }
        Ok(Self { root, layout })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn compound_dir(&self, display_name: &str) -> Utf8PathBuf {
        match self.layout {
            Layout::Flat => self.root.clone(),
            Layout::Nested => self.root.join(sanitize(display_name)),
        }
    }

    pub fn write(
        &self,
        table: &CanonicalTable,
        zinc: Option<&[ResultRow]>,
        quota: Quota,
    ) -> Result<WrittenFiles, HarvestError> {
        let name = sanitize(&table.origin().identifier);
        let dir = self.compound_dir(&table.origin().identifier);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("create {dir}: {err}")))?;

        let mut written = WrittenFiles::default();

        let pubchem_table = dir.join(format!("{name}-pubchem.txt"));
        write_atomic(&pubchem_table, format_table(table.rows()).as_bytes())?;
        written.tables.push(pubchem_table);

        let origin = dir.join(format!("{name}-{name}.smi"));
        write_atomic(&origin, table.origin().structure.as_bytes())?;
        written.structures.push(origin);

        let related_budget = quota.pubchem.map(|quota| quota.saturating_sub(1));
        for row in take(table.related(), related_budget) {
            let path = dir.join(format!("{name}-cid{}.smi", sanitize(&row.identifier)));
            write_atomic(&path, row.structure.as_bytes())?;
            written.structures.push(path);
        }

        if let Some(rows) = zinc {
            let zinc_table = dir.join(format!("{name}-zinc.txt"));
            write_atomic(&zinc_table, format_table(rows).as_bytes())?;
            written.tables.push(zinc_table);

            for row in take(rows, quota.zinc) {
                let path = dir.join(format!("{name}-{}.smi", sanitize(&row.identifier)));
                write_atomic(&path, row.structure.as_bytes())?;
                written.structures.push(path);
            }
        }

        tracing::info!(
            dir = %dir,
            structures = written.structures.len(),
            "files written"
        );
        Ok(written)
    }
}

/// One `identifier structure` line per row.
pub fn format_table(rows: &[ResultRow]) -> String {
    rows.iter()
        .map(|row| format!("{} {}\n", row.identifier, row.structure))
        .collect()
}

pub fn sanitize(component: &str) -> String {
    let cleaned = UNSAFE_FILE_CHARS.replace_all(component.trim(), "_");
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return "_".to_string();
    }
    cleaned.into_owned()
}

fn take(rows: &[ResultRow], budget: Option<usize>) -> &[ResultRow] {
    match budget {
        Some(budget) => &rows[..budget.min(rows.len())],
        None => rows,
    }
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HarvestError> {
    let parent = path
        .parent()
        .ok_or_else(|| HarvestError::Filesystem("invalid destination path".to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("ligand-harvester")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}
