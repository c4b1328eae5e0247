//! Schema checks for catalog files.
//!
//! Each check is a pure function over an in-memory [`CatalogFile`] and
//! reports what is wrong rather than failing, so callers can collect every
//! problem with a file in one pass.

use std::collections::HashSet;

use super::CatalogFile;

/// Columns every catalog must provide.
pub const REQUIRED_COLUMNS: [&str; 4] = ["halo_id", "halo_x", "halo_y", "halo_z"];

/// Simulation metadata every cache-worthy catalog must provide, on top of
/// the log attributes.
pub const REQUIRED_METADATA: [&str; 2] = ["Lbox", "particle_mass"];

/// Prefix shared by all halo table columns.
pub const COLUMN_PREFIX: &str = "halo_";

const POSITION_COLUMNS: [&str; 3] = ["halo_x", "halo_y", "halo_z"];

/// Required columns absent from the table, in [`REQUIRED_COLUMNS`] order.
#[must_use]
pub fn missing_columns(catalog: &CatalogFile) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|name| catalog.column(name).is_none())
        .map(|name| (*name).to_string())
        .collect()
}

/// Keys from `keys` with no attached attribute, in the given order.
#[must_use]
pub fn missing_metadata(catalog: &CatalogFile, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter(|key| catalog.attr(key).is_none())
        .map(|key| (*key).to_string())
        .collect()
}

/// Column names that do not start with [`COLUMN_PREFIX`].
#[must_use]
pub fn columns_without_halo_prefix(catalog: &CatalogFile) -> Vec<String> {
    catalog
        .column_names()
        .filter(|name| !name.starts_with(COLUMN_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Position columns holding at least one value outside `[0, lbox]`.
///
/// Missing position columns are not reported here; see [`missing_columns`].
#[must_use]
pub fn positions_outside_box(catalog: &CatalogFile, lbox: f64) -> Vec<String> {
    POSITION_COLUMNS
        .iter()
        .filter_map(|name| catalog.column(name))
        .filter(|column| column.values.iter().any(|&v| !(0.0..=lbox).contains(&v)))
        .map(|column| column.name.clone())
        .collect()
}

/// Number of `halo_id` values that repeat an earlier value.
#[must_use]
pub fn duplicate_halo_ids(catalog: &CatalogFile) -> usize {
    let Some(ids) = catalog.column("halo_id") else {
        return 0;
    };
    let mut seen = HashSet::with_capacity(ids.values.len());
    ids.values
        .iter()
        .filter(|id| !seen.insert(id.to_bits()))
        .count()
}
