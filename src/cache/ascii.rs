//! Plain-text persistence of the cache log.
//!
//! The log is a header comment followed by one entry per line, the five
//! fields separated by single spaces:
//!
//! ```text
//! # simname halo_finder version_name redshift fname
//! bolshoi rockstar halotools_v0p4 0.0000 /data/halos/bolshoi_z0.hdf5
//! ```
//!
//! Blank lines and lines starting with `#` are ignored on read. Inside a
//! field, `%`, whitespace and a leading `#` are written as `%XX` escapes of
//! their UTF-8 bytes, so paths such as `/Users/me/Library/Application
//! Support/halos.hdf5` survive the round trip. A `%` not followed by two hex
//! digits is read literally.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::entry::CacheLogEntry;
use super::error::{CacheError, CacheResult};

/// Header line written at the top of every log file.
pub const HEADER: &str = "# simname halo_finder version_name redshift fname";

/// Parse log text into entries, preserving line order.
///
/// Repeated entries are dropped with a warning. Any non-comment line without
/// exactly five fields is an error naming its 1-based line number.
pub fn parse_log(text: &str) -> CacheResult<Vec<CacheLogEntry>> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let &[simname, halo_finder, version_name, redshift, fname] = fields.as_slice() else {
            return Err(CacheError::MalformedLog {
                line: idx + 1,
                content: line.to_string(),
            });
        };

        let entry = CacheLogEntry::new(
            unescape_field(simname),
            unescape_field(halo_finder),
            unescape_field(version_name),
            unescape_field(redshift),
            unescape_field(fname),
        );
        if seen.insert(entry.clone()) {
            entries.push(entry);
        } else {
            log::warn!("Dropping repeated cache log entry on line {}: {}", idx + 1, entry);
        }
    }

    Ok(entries)
}

/// Render entries as log text, header included.
#[must_use]
pub fn format_log(entries: &[CacheLogEntry]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + entries.len() * 96);
    out.push_str(HEADER);
    out.push('\n');
    for entry in entries {
        let fields = [
            &entry.simname,
            &entry.halo_finder,
            &entry.version_name,
            &entry.redshift,
            &entry.fname,
        ];
        for (idx, field) in fields.into_iter().enumerate() {
            if idx > 0 {
                out.push(' ');
            }
            out.push_str(&escape_field(field));
        }
        out.push('\n');
    }
    out
}

/// Escape a field value so it stays a single whitespace-free token.
#[must_use]
pub fn escape_field(value: &str) -> Cow<'_, str> {
    let needs_escape =
        |idx: usize, c: char| c == '%' || c.is_whitespace() || (idx == 0 && c == '#');
    if !value.char_indices().any(|(idx, c)| needs_escape(idx, c)) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    let mut buf = [0u8; 4];
    for (idx, c) in value.char_indices() {
        if needs_escape(idx, c) {
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Reverse [`escape_field`].
#[must_use]
pub fn unescape_field(token: &str) -> String {
    if !token.contains('%') {
        return token.to_string();
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let decoded = (bytes[idx] == b'%')
            .then(|| token.get(idx + 1..idx + 3))
            .flatten()
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match decoded {
            Some(byte) => {
                out.push(byte);
                idx += 3;
            }
            None => {
                out.push(bytes[idx]);
                idx += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Read and parse the log at `path`. A missing file is an empty log.
pub fn read_log(path: &Path) -> CacheResult<Vec<CacheLogEntry>> {
    if !path.exists() {
        log::debug!("No cache log at {}, starting empty", path.display());
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
    let entries = parse_log(&text)?;
    log::debug!(
        "Read {} cache log entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Overwrite the log at `path` with `entries`.
///
/// The text goes to a uniquely named temp file in the same directory that
/// is then renamed over `path`, so a reader sees either the old or the new
/// log in full and no other file in the directory is touched.
pub fn write_log(path: &Path, entries: &[CacheLogEntry]) -> CacheResult<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
            parent
        }
        None => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(parent).map_err(|e| CacheError::io(parent, e))?;
    file.write_all(format_log(entries).as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| CacheError::io(file.path(), e))?;
    // A failed persist drops the temp file, which deletes it.
    file.persist(path).map_err(|e| CacheError::io(path, e.error))?;

    log::debug!(
        "Wrote {} cache log entries to {}",
        entries.len(),
        path.display()
    );
    Ok(())
}
