//! Frame builders shared by unit tests

use crate::data::TRAIT_HEADER;
use polars::prelude::*;

/// FungalTraits frame in [`TRAIT_HEADER`] order; empty strings become nulls
pub(crate) fn trait_frame(rows: &[[&str; 24]]) -> DataFrame {
    let columns = TRAIT_HEADER
        .iter()
        .enumerate()
        .map(|(col_idx, name)| {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|row| Some(row[col_idx]).filter(|v| !v.is_empty()))
                .collect();
            Series::new((*name).into(), values).into_column()
        })
        .collect();
    DataFrame::new(columns).unwrap()
}

/// Row with lineage, genus and primary lifestyle set
pub(crate) fn trait_row(
    family: &'static str,
    genus: &'static str,
    lifestyle: &'static str,
) -> [&'static str; 24] {
    let mut row = [""; 24];
    row[0] = "Fungi";
    row[1] = "Ascomycota";
    row[4] = family;
    row[5] = genus;
    row[7] = lifestyle;
    row
}
