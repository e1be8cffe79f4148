use std::collections::{BTreeMap, BTreeSet};

use super::model::{AirQualityDataset, CellValue};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// Columns absent from the map are unrestricted.
pub type FilterState = BTreeMap<String, BTreeSet<CellValue>>;

/// Initialise a [`FilterState`] for `columns` with every value selected.
/// Columns missing from the dataset are left out.
pub fn init_filter_state(dataset: &AirQualityDataset, columns: &[&str]) -> FilterState {
    columns
        .iter()
        .filter(|col| dataset.column_index(col).is_some())
        .map(|col| (col.to_string(), dataset.unique_values(col)))
        .collect()
}

/// Return indices of records that pass all active filters.
///
/// A record passes a column filter when:
/// * The column is not in the dataset → passes (no constraint)
/// * The filter set for that column is empty → nothing selected → fails
/// * The record's value for that column is in the selected set → passes
pub fn filtered_indices(dataset: &AirQualityDataset, filters: &FilterState) -> Vec<usize> {
    let active: Vec<(usize, &BTreeSet<CellValue>)> = filters
        .iter()
        .filter_map(|(col, selected)| Some((dataset.column_index(col)?, selected)))
        .collect();

    dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            active
                .iter()
                .all(|(idx, selected)| selected.contains(&rec.values[*idx]))
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, ColumnType, Record};

    fn cities(names: &[&str]) -> AirQualityDataset {
        let columns = vec![Column {
            name: "City".into(),
            dtype: ColumnType::String,
        }];
        let records = names
            .iter()
            .map(|n| Record {
                values: vec![CellValue::String(n.to_string())],
            })
            .collect();
        AirQualityDataset::new(columns, records).unwrap()
    }

    #[test]
    fn everything_selected_keeps_all_rows() {
        let ds = cities(&["Delhi", "Pune", "Delhi"]);
        let filters = init_filter_state(&ds, &["City", "Year"]);
        assert_eq!(filters.len(), 1);
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn deselected_values_are_hidden() {
        let ds = cities(&["Delhi", "Pune", "Delhi"]);
        let mut filters = init_filter_state(&ds, &["City"]);
        filters
            .get_mut("City")
            .unwrap()
            .remove(&CellValue::String("Delhi".into()));
        assert_eq!(filtered_indices(&ds, &filters), vec![1]);

        filters.get_mut("City").unwrap().clear();
        assert!(filtered_indices(&ds, &filters).is_empty());
    }
}
