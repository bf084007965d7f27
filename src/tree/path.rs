//! Namespace path grammar.
//!
//! Paths are `/`-separated segments. A segment is non-empty, at most
//! [`MAX_ENTRY_NAME_LEN`] bytes, and never contains `.`, `[` or `]` (those
//! belong to the JSON extraction grammar).

use crate::error::{HubError, Result};
use crate::types::MAX_ENTRY_NAME_LEN;

/// Namespace that holds every Observation.
pub const OBS_ROOT: &str = "/obs";

/// Split a path into validated segments.
///
/// A single leading `/` is ignored; an empty path yields no segments.
pub fn split(path: &str) -> Result<Vec<&str>> {
    let rel = path.strip_prefix('/').unwrap_or(path);
    if rel.is_empty() {
        return Ok(Vec::new());
    }
    rel.split('/').map(|seg| validate_segment(path, seg)).collect()
}

fn validate_segment<'a>(path: &str, segment: &'a str) -> Result<&'a str> {
    if segment.is_empty() {
        return Err(HubError::Malformed(format!("empty segment in '{}'", path)));
    }
    if segment.contains(['.', '[', ']']) {
        return Err(HubError::Malformed(format!(
            "segment '{}' in '{}' contains '.', '[' or ']'",
            segment, path
        )));
    }
    if segment.len() > MAX_ENTRY_NAME_LEN {
        return Err(HubError::Malformed(format!(
            "segment '{}' longer than {} bytes",
            segment, MAX_ENTRY_NAME_LEN
        )));
    }
    Ok(segment)
}

/// Normalise an Observation path to its part relative to [`OBS_ROOT`].
///
/// Accepts `/obs/<relative>` or a bare `<relative>`; any other absolute path
/// is `Malformed`.
pub fn obs_relative(path: &str) -> Result<&str> {
    let rel = match path.strip_prefix('/') {
        Some(rest) => rest
            .strip_prefix("obs/")
            .ok_or_else(|| HubError::Malformed(format!("'{}' is not under {}", path, OBS_ROOT)))?,
        None => path,
    };
    if rel.is_empty() {
        return Err(HubError::Malformed(format!("empty observation path '{}'", path)));
    }
    split(rel)?;
    Ok(rel)
}

/// Absolute path of an Observation given its relative path.
pub fn obs_absolute(rel: &str) -> String {
    format!("{}/{}", OBS_ROOT, rel)
}

/// Backup store name for an Observation's relative path.
///
/// `.` cannot appear in a segment, so the mapping is reversible.
pub fn backup_name(rel: &str) -> String {
    rel.replace('/', ".")
}

/// Inverse of [`backup_name`].
pub fn backup_name_to_rel(name: &str) -> String {
    name.replace('.', "/")
}
