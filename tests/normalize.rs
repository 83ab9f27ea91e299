use ligand_harvester::domain::{Compound, ResultRow};
use ligand_harvester::normalize::{normalize, normalize_for};

fn rows(pairs: &[(&str, &str)]) -> Vec<ResultRow> {
    pairs
        .iter()
        .map(|(identifier, structure)| ResultRow::new(*identifier, *structure))
        .collect()
}

fn ethanol() -> Compound {
    Compound {
        identifier: "702".to_string(),
        structure: "CCO".to_string(),
        display_name: "ethanol".to_string(),
    }
}

#[test]
fn ethanol_table_matches_expected() {
    let table = normalize_for(&ethanol(), rows(&[("702", "CCO"), ("887", "CCOC")])).unwrap();
    assert_eq!(
        table.rows(),
        rows(&[("ethanol", "CCO"), ("887", "CCOC")]).as_slice()
    );
}

#[test]
fn exactly_one_row_carries_display_name() {
    let raw = rows(&[
        ("1031", "CCCO"),
        ("702", "CCO"),
        ("887", "CCOC"),
        ("702", "CCO"),
        ("6342", "CCC=O"),
    ]);
    let table = normalize_for(&ethanol(), raw).unwrap();
    let named: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row.identifier == "ethanol")
        .map(|(index, _)| index)
        .collect();
    assert_eq!(named, vec![0]);
}

#[test]
fn related_rows_keep_upstream_order() {
    let raw = rows(&[
        ("6342", "CCC=O"),
        ("1031", "CCCO"),
        ("702", "CCO"),
        ("887", "CCOC"),
        ("7847", "CCOCC"),
    ]);
    let table = normalize_for(&ethanol(), raw).unwrap();
    let related: Vec<&str> = table
        .related()
        .iter()
        .map(|row| row.identifier.as_str())
        .collect();
    assert_eq!(related, vec!["6342", "1031", "887", "7847"]);
}

#[test]
fn normalization_is_idempotent() {
    let raw = rows(&[("887", "CCOC"), ("702", "CCO"), ("1031", "CCCO")]);
    let once = normalize("702", "ethanol", "CCO", raw).unwrap();
    let twice = normalize("702", "ethanol", "CCO", once.clone().into_rows()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn first_structure_match_wins() {
    let raw = rows(&[("887", "CCOC"), ("702", "CCO"), ("99999", "CCO")]);
    let table = normalize_for(&ethanol(), raw).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.origin(), &ResultRow::new("ethanol", "CCO"));
    assert_eq!(table.related(), rows(&[("887", "CCOC")]).as_slice());
}

#[test]
fn repeated_related_identifiers_are_dropped() {
    let raw = rows(&[("702", "CCO"), ("887", "CCOC"), ("887", "CCOC")]);
    let table = normalize_for(&ethanol(), raw).unwrap();
    assert_eq!(table.len(), 2);
}
