//! halocache - Halo Catalog Cache
//!
//! A log-backed registry mapping simulation metadata (simulation name, halo
//! finder, version, redshift) to halo catalog files on disk, validated
//! against the metadata each catalog carries about itself.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod logging;
