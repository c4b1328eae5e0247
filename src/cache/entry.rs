//! Cache log entry definitions.
//!
//! A [`CacheLogEntry`] identifies one cached catalog by four descriptive
//! fields plus the file location. Entries can be built by hand or derived
//! from a catalog's own metadata with [`CacheLogEntry::from_file`].

use std::fmt;
use std::path::Path;

use thiserror::Error;

use super::error::{CacheError, CacheResult};
use crate::catalog::checks::{self, REQUIRED_METADATA};
use crate::catalog::{CatalogFile, CATALOG_EXTENSION};

/// Metadata keys a catalog must carry to self-determine its log entry.
pub const LOG_ATTRIBUTES: [&str; 4] = ["simname", "halo_finder", "version_name", "redshift"];

/// Format a redshift as the canonical log token (four decimal places).
///
/// # Example
///
/// ```
/// use halocache::cache::redshift_string;
///
/// assert_eq!(redshift_string(1.0), "1.0000");
/// assert_eq!(redshift_string(0.54321), "0.5432");
/// ```
#[must_use]
pub fn redshift_string(redshift: f64) -> String {
    let token = format!("{redshift:.4}");
    // Values in (-5e-5, 0] would otherwise print as "-0.0000".
    if token == "-0.0000" {
        "0.0000".to_string()
    } else {
        token
    }
}

/// Represents a single catalog entry in the cache log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheLogEntry {
    pub simname: String,
    pub halo_finder: String,
    pub version_name: String,
    /// Canonical redshift token, see [`redshift_string`].
    pub redshift: String,
    pub fname: String,
}

/// Why a file could not self-determine its log entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectionFailure {
    #[error("File does not exist")]
    FileDoesNotExist,

    #[error("Can only self-determine the log entry of files with .hdf5 extension")]
    UnsupportedExtension,

    #[error("The hdf5 file could not be read: {0}")]
    Unreadable(String),

    #[error("The hdf5 file is missing the following metadata: {}", .0.join(", "))]
    MissingMetadata(Vec<String>),

    #[error("The hdf5 file is missing the following required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// A reason a logged catalog is not safe to serve from the cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyIssue {
    /// The file could not be inspected at all.
    #[error("{0}")]
    Inspection(InspectionFailure),

    /// A metadata attribute disagrees with the log entry.
    #[error("metadata {key} = {found:?} in the file but {expected:?} in the log")]
    MetadataMismatch {
        key: String,
        expected: String,
        found: String,
    },

    /// A metadata attribute that must be numeric is not.
    #[error("metadata {0} is not numeric")]
    NonNumericMetadata(String),

    #[error("columns must begin with \"halo_\": {}", .0.join(", "))]
    ColumnsWithoutPrefix(Vec<String>),

    #[error("columns {} have values outside [0, {lbox}]", .columns.join(", "))]
    PositionsOutsideBox { columns: Vec<String>, lbox: f64 },

    #[error("{0} repeated halo_id values")]
    DuplicateHaloIds(usize),
}

impl CacheLogEntry {
    /// Create a new entry. Nothing is checked against the filesystem.
    #[must_use]
    pub fn new(
        simname: impl Into<String>,
        halo_finder: impl Into<String>,
        version_name: impl Into<String>,
        redshift: impl Into<String>,
        fname: impl Into<String>,
    ) -> Self {
        Self {
            simname: simname.into(),
            halo_finder: halo_finder.into(),
            version_name: version_name.into(),
            redshift: redshift.into(),
            fname: fname.into(),
        }
    }

    /// Derive an entry from the metadata attached to the catalog at `path`.
    ///
    /// The returned entry's `fname` is `path` made absolute against the
    /// current directory, so a moved file yields an entry pointing at its new
    /// location and the entry stays valid after the working directory changes.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InspectionFailure> {
        let path = path.as_ref();
        let catalog = open_catalog(path)?;
        let fname = absolute_fname(path)
            .map_err(|e| InspectionFailure::Unreadable(e.to_string()))?;

        let missing = checks::missing_metadata(&catalog, &LOG_ATTRIBUTES);
        if !missing.is_empty() {
            return Err(InspectionFailure::MissingMetadata(missing));
        }
        let missing = checks::missing_columns(&catalog);
        if !missing.is_empty() {
            return Err(InspectionFailure::MissingColumns(missing));
        }

        let [simname, halo_finder, version_name, redshift] =
            LOG_ATTRIBUTES.map(|key| identity_value(&catalog, key).unwrap_or_default());
        Ok(Self {
            simname,
            halo_finder,
            version_name,
            redshift,
            fname,
        })
    }

    /// Value of the log attribute `key`, or `None` for unknown keys.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "simname" => Some(&self.simname),
            "halo_finder" => Some(&self.halo_finder),
            "version_name" => Some(&self.version_name),
            "redshift" => Some(&self.redshift),
            "fname" => Some(&self.fname),
            _ => None,
        }
    }

    /// The redshift token as a number, if it parses.
    #[must_use]
    pub fn redshift_value(&self) -> Option<f64> {
        self.redshift.parse().ok()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        Path::new(&self.fname)
    }

    /// Point the entry at a new file location.
    pub fn set_fname(&mut self, fname: impl Into<String>) {
        self.fname = fname.into();
    }

    /// Check that every field can be stored in the ascii log.
    ///
    /// Whitespace and `#` are escaped on write, so only empty fields are
    /// rejected.
    pub fn validate_fields(&self) -> CacheResult<()> {
        for key in LOG_ATTRIBUTES.iter().copied().chain(["fname"]) {
            if self.attribute(key).unwrap_or_default().is_empty() {
                return Err(CacheError::InvalidEntry(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    /// A copy of this entry whose `fname` is absolute.
    pub fn with_absolute_fname(&self) -> CacheResult<Self> {
        let fname =
            absolute_fname(self.path()).map_err(|e| CacheError::io(self.path(), e))?;
        Ok(Self {
            fname,
            ..self.clone()
        })
    }

    /// Audit whether the referenced file is safe to serve from the cache.
    ///
    /// An empty report means the file exists, is readable, carries metadata
    /// matching this entry and holds a well-formed halo table.
    #[must_use]
    pub fn safety_report(&self) -> Vec<SafetyIssue> {
        let catalog = match open_catalog(self.path()) {
            Ok(catalog) => catalog,
            Err(failure) => return vec![SafetyIssue::Inspection(failure)],
        };

        let mut issues = Vec::new();

        let mut required: Vec<&str> = LOG_ATTRIBUTES.to_vec();
        required.extend(REQUIRED_METADATA);
        let missing = checks::missing_metadata(&catalog, &required);
        if !missing.is_empty() {
            issues.push(SafetyIssue::Inspection(InspectionFailure::MissingMetadata(
                missing,
            )));
        }

        for key in LOG_ATTRIBUTES {
            let Some(found) = identity_value(&catalog, key) else {
                continue;
            };
            let expected = self.attribute(key).unwrap_or_default();
            if found != expected {
                issues.push(SafetyIssue::MetadataMismatch {
                    key: key.to_string(),
                    expected: expected.to_string(),
                    found,
                });
            }
        }

        let missing = checks::missing_columns(&catalog);
        if !missing.is_empty() {
            issues.push(SafetyIssue::Inspection(InspectionFailure::MissingColumns(
                missing,
            )));
        }

        let unprefixed = checks::columns_without_halo_prefix(&catalog);
        if !unprefixed.is_empty() {
            issues.push(SafetyIssue::ColumnsWithoutPrefix(unprefixed));
        }

        if let Some(lbox) = catalog.attr("Lbox") {
            match lbox.as_f64() {
                Some(lbox) => {
                    let columns = checks::positions_outside_box(&catalog, lbox);
                    if !columns.is_empty() {
                        issues.push(SafetyIssue::PositionsOutsideBox { columns, lbox });
                    }
                }
                None => issues.push(SafetyIssue::NonNumericMetadata("Lbox".to_string())),
            }
        }

        let repeats = checks::duplicate_halo_ids(&catalog);
        if repeats > 0 {
            issues.push(SafetyIssue::DuplicateHaloIds(repeats));
        }

        issues
    }

    /// Whether [`safety_report`](Self::safety_report) finds nothing wrong.
    #[must_use]
    pub fn is_safe_for_cache(&self) -> bool {
        self.safety_report().is_empty()
    }
}

impl fmt::Display for CacheLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.simname, self.halo_finder, self.version_name, self.redshift, self.fname
        )
    }
}

/// `path` made absolute without touching the filesystem. Symlinks are kept.
pub(crate) fn absolute_fname(path: &Path) -> std::io::Result<String> {
    std::path::absolute(path).map(|p| p.to_string_lossy().into_owned())
}

/// Existence, extension and readability checks shared by inspection and audit.
fn open_catalog(path: &Path) -> Result<CatalogFile, InspectionFailure> {
    if !path.exists() {
        return Err(InspectionFailure::FileDoesNotExist);
    }
    if path.extension().and_then(|ext| ext.to_str()) != Some(CATALOG_EXTENSION) {
        return Err(InspectionFailure::UnsupportedExtension);
    }
    CatalogFile::read(path).map_err(|e| {
        log::debug!("Failed to read catalog {}: {}", path.display(), e);
        InspectionFailure::Unreadable(e.to_string())
    })
}

/// Read a log attribute from catalog metadata as a log token.
fn identity_value(catalog: &CatalogFile, key: &str) -> Option<String> {
    let value = catalog.attr(key)?;
    Some(match (key, value.as_str()) {
        (_, Some(s)) => s.to_string(),
        ("redshift", None) => value.as_f64().map_or_else(|| value.to_string(), redshift_string),
        _ => value.to_string(),
    })
}
