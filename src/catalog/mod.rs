//! Catalog container files.
//!
//! A catalog file holds a table of named numeric columns describing the halos
//! of one simulation snapshot, together with scalar key-value metadata that
//! records where the table came from (simulation, halo finder, version,
//! redshift, box size, particle mass).
//!
//! # Architecture
//!
//! * [`file`]: The [`CatalogFile`] model and its checksummed on-disk container.
//! * [`checks`]: Schema checks used to decide whether a file is cache-worthy.
//!
//! Catalog files carry the `.hdf5` extension by convention (see
//! [`CATALOG_EXTENSION`]), but the container is **not** HDF5. It is this
//! crate's own checksummed `bincode` format. Catalogs written by HDF5 tools
//! are rejected with [`CatalogError::BadMagic`] and therefore inspect as
//! unreadable; convert them with [`CatalogFile::write`] before logging them.

pub mod checks;
pub mod file;

pub use file::{AttrValue, CatalogError, CatalogFile, Column, CATALOG_EXTENSION};
