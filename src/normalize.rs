//! Origin-first canonical ordering of substructure search results.
//!
//! PubChem reports the searched compound under its own CID. The row is found by
//! structure, relabelled with the display name and moved to the front; every
//! other row keeps its upstream position relative to the rest.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::{Compound, ResultRow};
use crate::error::HarvestError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalTable {
    rows: Vec<ResultRow>,
}

impl CanonicalTable {
    pub fn origin(&self) -> &ResultRow {
        &self.rows[0]
    }

    /// Rows after the origin, in upstream order.
    pub fn related(&self) -> &[ResultRow] {
        &self.rows[1..]
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}

pub fn normalize_for(
    origin: &Compound,
    rows: Vec<ResultRow>,
) -> Result<CanonicalTable, HarvestError> {
    normalize(
        &origin.identifier,
        &origin.display_name,
        &origin.structure,
        rows,
    )
}

pub fn normalize(
    origin_identifier: &str,
    origin_display_name: &str,
    origin_structure: &str,
    rows: Vec<ResultRow>,
) -> Result<CanonicalTable, HarvestError> {
    let origin_index = rows
        .iter()
        .position(|row| row.structure == origin_structure)
        .ok_or_else(|| HarvestError::NormalizationMismatch {
            identifier: origin_identifier.to_string(),
            structure: origin_structure.to_string(),
        })?;

    let mut canonical = Vec::with_capacity(rows.len());
    canonical.push(ResultRow::new(origin_display_name, origin_structure));

    let mut seen = HashSet::new();
    seen.insert(origin_display_name.to_string());
    for (index, row) in rows.into_iter().enumerate() {
        if index == origin_index || row.structure == origin_structure {
            continue;
        }
        if !seen.insert(row.identifier.clone()) {
            tracing::debug!(identifier = %row.identifier, "duplicate search row dropped");
            continue;
        }
        canonical.push(row);
    }

    Ok(CanonicalTable { rows: canonical })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn rows(pairs: &[(&str, &str)]) -> Vec<ResultRow> {
        pairs
            .iter()
            .map(|(identifier, structure)| ResultRow::new(*identifier, *structure))
            .collect()
    }

    #[test]
    fn origin_moves_to_front() {
        let table = normalize(
            "702",
            "ethanol",
            "CCO",
            rows(&[("887", "CCOC"), ("702", "CCO"), ("6334", "CCCO")]),
        )
        .unwrap();
        assert_eq!(
            table.rows(),
            rows(&[("ethanol", "CCO"), ("887", "CCOC"), ("6334", "CCCO")]).as_slice()
        );
    }

    #[test]
    fn missing_origin_is_mismatch() {
        let err = normalize("702", "ethanol", "CCO", rows(&[("887", "CCOC")])).unwrap_err();
        assert_matches!(err, HarvestError::NormalizationMismatch { identifier, .. } if identifier == "702");
    }

    #[test]
    fn origin_duplicates_are_not_reinserted() {
        let table = normalize(
            "702",
            "ethanol",
            "CCO",
            rows(&[("702", "CCO"), ("887", "CCOC"), ("702", "CCO"), ("887", "CCOC")]),
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.origin().identifier, "ethanol");
        assert_eq!(table.related(), rows(&[("887", "CCOC")]).as_slice());
    }

    #[test]
    fn row_named_like_origin_is_dropped() {
        let table = normalize(
            "702",
            "702",
            "CCO",
            rows(&[("702", "CCO"), ("702", "OCC"), ("887", "CCOC")]),
        )
        .unwrap();
        let matching = table
            .rows()
            .iter()
            .filter(|row| row.identifier == "702")
            .count();
        assert_eq!(matching, 1);
    }
}
