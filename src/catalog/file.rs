//! Catalog container model and I/O.
//!
//! The container is a 4-byte magic followed by a `bincode` envelope. The
//! envelope carries a format version and the SHA-256 digest of the encoded
//! body, so truncated or tampered files are rejected on read instead of
//! yielding a half-populated table.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// File extension shared by all catalog files.
///
/// Kept for compatibility with existing cache layouts. The bytes behind it
/// are the container described in this module, not HDF5.
pub const CATALOG_EXTENSION: &str = "hdf5";

/// Leading bytes of every catalog container.
const MAGIC: &[u8; 4] = b"HCAT";

/// Current version of the container format.
pub const CONTAINER_VERSION: u32 = 1;

/// Error type for catalog container operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying filesystem failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file does not start with the container magic.
    #[error("not a catalog container: {0}")]
    BadMagic(PathBuf),

    /// The container was written by an incompatible format version.
    #[error("unsupported catalog container version {found} in {path} (expected {})", CONTAINER_VERSION)]
    UnsupportedVersion { path: PathBuf, found: u32 },

    /// The stored checksum does not match the stored body.
    #[error("catalog integrity check failed for {0}: checksum mismatch")]
    ChecksumMismatch(PathBuf),

    /// The catalog could not be encoded.
    #[error("failed to encode catalog: {0}")]
    Encode(#[source] bincode::Error),

    /// The container or its body could not be decoded.
    #[error("failed to decode catalog {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}

/// A scalar metadata value attached to a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Float(f64),
    Int(i64),
}

impl AttrValue {
    /// The string payload, if this is a string attribute.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. String attributes are parsed.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Str(s) => s.trim().parse().ok(),
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A named numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// A halo table plus its attached metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Scalar metadata keyed by attribute name.
    pub attrs: BTreeMap<String, AttrValue>,
    /// Table columns in insertion order.
    pub columns: Vec<Column>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    body: Vec<u8>,
}

impl CatalogFile {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, replacing any existing column of the same name.
    #[must_use]
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Self {
        self.set_column(name, values);
        self
    }

    /// Insert or replace a column.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
    }

    /// Attach a metadata attribute, returning the previous value if any.
    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.attrs.insert(key.to_string(), value.into())
    }

    /// Detach a metadata attribute.
    pub fn remove_attr(&mut self, key: &str) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of rows, taken as the length of the longest column.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    /// Write the catalog to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<(), CatalogError> {
        let body = bincode::serialize(self).map_err(CatalogError::Encode)?;
        let envelope = Envelope {
            version: CONTAINER_VERSION,
            checksum: digest(&body),
            body,
        };
        let encoded = bincode::serialize(&envelope).map_err(CatalogError::Encode)?;

        let io_err = |source: io::Error| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::create(path).map_err(io_err)?;
        file.write_all(MAGIC).map_err(io_err)?;
        file.write_all(&encoded).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        log::trace!(
            "Wrote catalog {} ({} columns, {} attributes)",
            path.display(),
            self.columns.len(),
            self.attrs.len()
        );
        Ok(())
    }

    /// Read a catalog from `path`, verifying its magic, version and checksum.
    pub fn read(path: &Path) -> Result<Self, CatalogError> {
        let mut content = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut content))
            .map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let payload = content
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| CatalogError::BadMagic(path.to_path_buf()))?;

        let envelope: Envelope =
            bincode::deserialize(payload).map_err(|source| CatalogError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        if envelope.version != CONTAINER_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: envelope.version,
            });
        }
        if digest(&envelope.body) != envelope.checksum {
            return Err(CatalogError::ChecksumMismatch(path.to_path_buf()));
        }

        bincode::deserialize(&envelope.body).map_err(|source| CatalogError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
