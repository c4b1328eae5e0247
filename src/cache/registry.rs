//! The halo table cache: an ordered set of log entries mirrored to disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use walkdir::WalkDir;

use super::ascii;
use super::entry::{absolute_fname, CacheLogEntry, InspectionFailure, SafetyIssue};
use super::error::{CacheError, CacheResult};
use crate::catalog::CATALOG_EXTENSION;
use crate::config::{CacheConfig, DEFAULT_REDSHIFT_TOLERANCE};

/// Location of the standard cache log, relative to the home directory.
pub const STANDARD_LOG_RELPATH: &str = ".astropy/cache/halotools/halo_table_cache_log.txt";

/// Resolve the standard cache log location for the current user.
pub fn standard_log_location() -> CacheResult<PathBuf> {
    let dirs = BaseDirs::new().ok_or(CacheError::NoHomeDirectory)?;
    Ok(dirs.home_dir().join(STANDARD_LOG_RELPATH))
}

/// Outcome of [`HaloTableCache::add_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was appended to the log.
    Added,
    /// An equal entry was already present; the log is unchanged.
    AlreadyPresent,
}

impl fmt::Display for AddOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => f.write_str("entry added to the cache log"),
            Self::AlreadyPresent => f.write_str("cache log already contains the entry"),
        }
    }
}

/// Options for [`HaloTableCache::remove_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Rewrite the ascii log after a removal.
    pub update_ascii: bool,
    /// Fail with [`CacheError::EntryNotFound`] when nothing matches.
    pub raise_non_existence: bool,
    /// Also delete the catalog file the removed entry points at.
    pub delete_file: bool,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            update_ascii: true,
            raise_non_existence: true,
            delete_file: false,
        }
    }
}

/// Field filter for [`HaloTableCache::matching_entries`].
///
/// Unset fields match everything. String fields match exactly; the redshift
/// matches any entry within `dz_tol` of the requested value.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFilter {
    pub simname: Option<String>,
    pub halo_finder: Option<String>,
    pub version_name: Option<String>,
    pub redshift: Option<f64>,
    pub fname: Option<String>,
    pub dz_tol: f64,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            simname: None,
            halo_finder: None,
            version_name: None,
            redshift: None,
            fname: None,
            dz_tol: DEFAULT_REDSHIFT_TOLERANCE,
        }
    }
}

impl From<&CacheConfig> for EntryFilter {
    fn from(config: &CacheConfig) -> Self {
        Self::default().dz_tol(config.redshift_tolerance)
    }
}

impl EntryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn simname(mut self, simname: impl Into<String>) -> Self {
        self.simname = Some(simname.into());
        self
    }

    #[must_use]
    pub fn halo_finder(mut self, halo_finder: impl Into<String>) -> Self {
        self.halo_finder = Some(halo_finder.into());
        self
    }

    #[must_use]
    pub fn version_name(mut self, version_name: impl Into<String>) -> Self {
        self.version_name = Some(version_name.into());
        self
    }

    #[must_use]
    pub fn redshift(mut self, redshift: f64) -> Self {
        self.redshift = Some(redshift);
        self
    }

    #[must_use]
    pub fn fname(mut self, fname: impl Into<String>) -> Self {
        self.fname = Some(fname.into());
        self
    }

    #[must_use]
    pub fn dz_tol(mut self, dz_tol: f64) -> Self {
        self.dz_tol = dz_tol;
        self
    }

    /// Whether `entry` satisfies every set field.
    #[must_use]
    pub fn matches(&self, entry: &CacheLogEntry) -> bool {
        let text_matches = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().map_or(true, |w| w == actual)
        };
        text_matches(&self.simname, &entry.simname)
            && text_matches(&self.halo_finder, &entry.halo_finder)
            && text_matches(&self.version_name, &entry.version_name)
            && text_matches(&self.fname, &entry.fname)
            && self.redshift.map_or(true, |z| {
                entry
                    .redshift_value()
                    .is_some_and(|found| (found - z).abs() <= self.dz_tol)
            })
    }
}

/// Summary of a [`HaloTableCache::discover`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    /// Entries appended to the log.
    pub added: Vec<CacheLogEntry>,
    /// Catalogs whose entry was already logged.
    pub already_present: usize,
    /// Catalogs that could not self-determine an entry, with the reason.
    pub rejected: Vec<(PathBuf, InspectionFailure)>,
    /// Catalogs whose self-determined entry cannot be stored in the log.
    pub invalid: Vec<(PathBuf, String)>,
}

/// Registry of cached halo catalogs, persisted as an ascii log.
///
/// The in-memory log keeps insertion order and never holds two equal
/// entries. Mutating operations take an `update_ascii` switch; when set, the
/// full log is rewritten to [`cache_log_fname`](Self::cache_log_fname)
/// before returning. Nothing is written on drop.
///
/// # Example
///
/// ```no_run
/// use halocache::cache::{CacheLogEntry, HaloTableCache};
///
/// let mut cache = HaloTableCache::new(true, None)?;
/// match cache.determine_log_entry_from_fname("/data/halos/bolshoi_z0.hdf5") {
///     Ok(entry) => {
///         cache.add_entry(entry, true)?;
///     }
///     Err(reason) => eprintln!("not cache-worthy: {reason}"),
/// }
/// # Ok::<(), halocache::cache::CacheError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HaloTableCache {
    log: Vec<CacheLogEntry>,
    cache_log_fname: PathBuf,
}

impl HaloTableCache {
    /// Create a cache backed by `cache_log_fname` (standard location if `None`).
    ///
    /// When `read_log_from_standard_loc` is set and the log file exists, its
    /// entries are loaded; otherwise the cache starts empty.
    pub fn new(
        read_log_from_standard_loc: bool,
        cache_log_fname: Option<PathBuf>,
    ) -> CacheResult<Self> {
        let cache_log_fname = match cache_log_fname {
            Some(path) => path,
            None => standard_log_location()?,
        };
        let entries = if read_log_from_standard_loc {
            ascii::read_log(&cache_log_fname)?
        } else {
            Vec::new()
        };
        log::debug!(
            "Opened halo table cache at {} with {} entries",
            cache_log_fname.display(),
            entries.len()
        );
        Ok(Self {
            log: entries,
            cache_log_fname,
        })
    }

    /// Create a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        Self::new(config.read_log_on_open, config.cache_log_fname.clone())
    }

    /// The entries in log order.
    #[must_use]
    pub fn log(&self) -> &[CacheLogEntry] {
        &self.log
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheLogEntry> {
        self.log.iter()
    }

    #[must_use]
    pub fn contains(&self, entry: &CacheLogEntry) -> bool {
        self.log.contains(entry)
    }

    /// Path of the ascii log this cache mirrors to.
    #[must_use]
    pub fn cache_log_fname(&self) -> &Path {
        &self.cache_log_fname
    }

    /// Add `entry` to the log.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidEntry`] if the entry's file does not exist or a
    /// field is empty. The existence check runs before the duplicate check.
    /// A relative `fname` is stored made absolute.
    pub fn add_entry(&mut self, entry: CacheLogEntry, update_ascii: bool) -> CacheResult<AddOutcome> {
        if !entry.path().exists() {
            return Err(CacheError::InvalidEntry(format!(
                "The input filename does not exist. {}",
                entry.fname
            )));
        }
        entry.validate_fields()?;
        let entry = entry.with_absolute_fname()?;

        if self.contains(&entry) {
            log::warn!(
                "{}: {}. The log is unchanged.",
                AddOutcome::AlreadyPresent,
                entry
            );
            return Ok(AddOutcome::AlreadyPresent);
        }

        log::info!("Adding cache log entry: {}", entry);
        self.log.push(entry);
        if update_ascii {
            self.write_ascii()?;
        }
        Ok(AddOutcome::Added)
    }

    /// Remove the entry equal to `lookup`, returning it.
    ///
    /// # Errors
    ///
    /// [`CacheError::EntryNotFound`] when no entry matches and
    /// `options.raise_non_existence` is set; otherwise a miss returns `Ok(None)`.
    pub fn remove_entry(
        &mut self,
        lookup: &CacheLogEntry,
        options: RemoveOptions,
    ) -> CacheResult<Option<CacheLogEntry>> {
        let Some(idx) = self.log.iter().position(|e| e == lookup) else {
            if options.raise_non_existence {
                return Err(CacheError::EntryNotFound);
            }
            log::debug!("Nothing to remove for {}", lookup);
            return Ok(None);
        };

        let removed = self.log.remove(idx);
        log::info!("Removed cache log entry: {}", removed);

        if options.delete_file {
            match fs::remove_file(removed.path()) {
                Ok(()) => log::info!("Deleted catalog {}", removed.fname),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("Catalog {} already gone", removed.fname);
                }
                Err(e) => return Err(CacheError::io(removed.path(), e)),
            }
        }

        if options.update_ascii {
            self.write_ascii()?;
        }
        Ok(Some(removed))
    }

    /// Derive a log entry from the metadata of the catalog at `fname`.
    ///
    /// Inspection failures are returned, not raised, so batch callers can
    /// skip files that are not yet cache-worthy.
    pub fn determine_log_entry_from_fname(
        &self,
        fname: impl AsRef<Path>,
    ) -> Result<CacheLogEntry, InspectionFailure> {
        CacheLogEntry::from_file(fname)
    }

    /// Point every entry logged at `old_fname` to `new_fname` instead.
    ///
    /// Entries keep their position and other fields. An entry that becomes
    /// equal to one already logged is dropped. `new_fname` is stored made
    /// absolute; `old_fname` matches either as written or made absolute.
    /// Returns the number of entries that matched `old_fname`.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidEntry`] if `new_fname` does not exist, and
    /// [`CacheError::NoEntryForFile`] if no entry is logged at `old_fname`.
    pub fn update_cached_file_location(
        &mut self,
        new_fname: &str,
        old_fname: &str,
        update_ascii: bool,
    ) -> CacheResult<usize> {
        if !Path::new(new_fname).exists() {
            return Err(CacheError::InvalidEntry(format!(
                "The input filename does not exist. {new_fname}"
            )));
        }
        let new_fname =
            absolute_fname(Path::new(new_fname)).map_err(|e| CacheError::io(new_fname, e))?;
        let old_absolute = absolute_fname(Path::new(old_fname)).ok();
        let is_old = |fname: &str| fname == old_fname || old_absolute.as_deref() == Some(fname);

        let mut relocated = 0;
        let mut idx = 0;
        while idx < self.log.len() {
            if !is_old(&self.log[idx].fname) {
                idx += 1;
                continue;
            }
            relocated += 1;

            let mut moved = self.log[idx].clone();
            moved.set_fname(new_fname.as_str());
            moved.validate_fields()?;
            let duplicate = self
                .log
                .iter()
                .enumerate()
                .any(|(j, e)| j != idx && *e == moved);
            if duplicate {
                log::warn!(
                    "Relocated entry duplicates an existing one, dropping: {}",
                    self.log[idx]
                );
                self.log.remove(idx);
            } else {
                log::info!("Relocating {} -> {}", self.log[idx], new_fname);
                self.log[idx] = moved;
                idx += 1;
            }
        }

        if relocated == 0 {
            return Err(CacheError::NoEntryForFile(old_fname.to_string()));
        }
        if update_ascii {
            self.write_ascii()?;
        }
        Ok(relocated)
    }

    /// Entries matching every set field of `filter`, in log order.
    pub fn matching_entries<'a>(
        &'a self,
        filter: &'a EntryFilter,
    ) -> impl Iterator<Item = &'a CacheLogEntry> + 'a {
        self.log.iter().filter(move |e| filter.matches(e))
    }

    /// Entries whose catalog file no longer exists.
    #[must_use]
    pub fn stale_entries(&self) -> Vec<&CacheLogEntry> {
        self.log.iter().filter(|e| !e.path().exists()).collect()
    }

    /// Entries with a non-empty [`CacheLogEntry::safety_report`].
    #[must_use]
    pub fn unsafe_entries(&self) -> Vec<(&CacheLogEntry, Vec<SafetyIssue>)> {
        self.log
            .iter()
            .filter_map(|e| {
                let issues = e.safety_report();
                (!issues.is_empty()).then_some((e, issues))
            })
            .collect()
    }

    /// Walk `root` and add every catalog that self-determines its entry.
    ///
    /// Files that fail inspection are recorded in the report and skipped.
    /// The ascii log is written once at the end if anything was added.
    pub fn discover(&mut self, root: &Path, update_ascii: bool) -> CacheResult<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        for dir_entry in WalkDir::new(root).sort_by_file_name() {
            let dir_entry = match dir_entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable path during discovery: {}", e);
                    continue;
                }
            };
            let path = dir_entry.path();
            if !dir_entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(CATALOG_EXTENSION)
            {
                continue;
            }

            match CacheLogEntry::from_file(path) {
                Ok(entry) => match self.add_entry(entry.clone(), false) {
                    Ok(AddOutcome::Added) => report.added.push(entry),
                    Ok(AddOutcome::AlreadyPresent) => report.already_present += 1,
                    Err(CacheError::InvalidEntry(reason)) => {
                        log::warn!("Skipping {}: {}", path.display(), reason);
                        report.invalid.push((path.to_path_buf(), reason));
                    }
                    Err(e) => return Err(e),
                },
                Err(failure) => {
                    log::debug!("Skipping {}: {}", path.display(), failure);
                    report.rejected.push((path.to_path_buf(), failure));
                }
            }
        }

        log::info!(
            "Discovery under {}: {} added, {} already logged, {} rejected",
            root.display(),
            report.added.len(),
            report.already_present,
            report.rejected.len() + report.invalid.len()
        );
        if update_ascii && !report.added.is_empty() {
            self.write_ascii()?;
        }
        Ok(report)
    }

    /// Overwrite the ascii log with the in-memory entries.
    pub fn write_ascii(&self) -> CacheResult<()> {
        ascii::write_log(&self.cache_log_fname, &self.log)
    }

    /// Replace the in-memory entries with the current contents of the ascii log.
    pub fn reload(&mut self) -> CacheResult<()> {
        self.log = ascii::read_log(&self.cache_log_fname)?;
        Ok(())
    }
}
