//! Halo table cache module for halocache.
//!
//! This module keeps a registry of halo catalog files on disk, keyed by the
//! simulation, halo finder, version and redshift they describe, and mirrors
//! it to a plain-text log so it survives between sessions.
//!
//! # Architecture
//!
//! The caching system is split into four components:
//!
//! * [`entry`]: The [`CacheLogEntry`] value type, file inspection and safety audits.
//! * [`ascii`]: Parsing and writing of the plain-text log.
//! * [`registry`]: The [`HaloTableCache`] itself: add, remove, query, relocate.
//! * [`error`]: The [`CacheError`] type shared by the above.
//!
//! # Trust Model
//!
//! Entries can be built by hand, but the preferred route is
//! [`HaloTableCache::determine_log_entry_from_fname`], which reads the
//! identity fields from metadata stored inside the catalog. Drift between a
//! logged entry and its file is not repaired automatically; it is surfaced by
//! [`HaloTableCache::stale_entries`] and [`HaloTableCache::unsafe_entries`].

pub mod ascii;
pub mod entry;
pub mod error;
pub mod registry;

pub use entry::{redshift_string, CacheLogEntry, InspectionFailure, SafetyIssue, LOG_ATTRIBUTES};
pub use error::{CacheError, CacheResult};
pub use registry::{
    standard_log_location, AddOutcome, DiscoveryReport, EntryFilter, HaloTableCache,
    RemoveOptions, STANDARD_LOG_RELPATH,
};
