//! Absolute path splitting, `spec.md` §4.G.
//!
//! Grounded on the closest available path-splitting helper in the pack,
//! `examples/ShHaWkK-The_Heap/fat32/src/lib.rs`'s `split_parent` (which
//! only splits a single parent/name pair); this generalizes to a full
//! ordered segment list as the spec requires.

use crate::error::{FatxError, Result};

/// Maximum bytes in one path segment (`filename_sz` is a single byte and
/// the on-disk `filename` field is 42 bytes).
pub const MAX_SEGMENT_LEN: usize = 42;

/// Split an absolute path into its segments.
///
/// - `""` or `"/"` returns an empty list (denotes the root).
/// - Leading `/` is skipped, the remainder is split on `/`; trailing
///   slashes are ignored (the final empty segment is dropped).
/// - A segment longer than 42 bytes is rejected with `NotFound` rather
///   than silently truncated or accepted.
pub fn split_path(path: &str) -> Result<Vec<Vec<u8>>> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }

    let rest = path.strip_prefix('/').unwrap_or(path);
    let mut segments = Vec::new();

    for part in rest.split('/') {
        if part.is_empty() {
            // Trailing slash (or repeated slash) — drop, matching the
            // "trailing slashes are ignored" rule.
            continue;
        }
        if part.len() > MAX_SEGMENT_LEN {
            log::warn!("path segment {part:?} exceeds {MAX_SEGMENT_LEN} bytes");
            return Err(FatxError::NotFound);
        }
        segments.push(part.as_bytes().to_vec());
    }

    Ok(segments)
}

/// All but the last segment. `None` if `segments.len() <= 1` (the parent of
/// a top-level entry, or of the root, is the root itself and has no
/// further segments to resolve).
pub fn dirname(segments: &[Vec<u8>]) -> Option<Vec<Vec<u8>>> {
    if segments.len() <= 1 {
        None
    } else {
        Some(segments[..segments.len() - 1].to_vec())
    }
}

/// The last segment, as a freshly-owned singleton list.
pub fn basename(segments: &[Vec<u8>]) -> Vec<Vec<u8>> {
    match segments.last() {
        Some(last) => vec![last.clone()],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_variants_split_empty() {
        assert_eq!(split_path("").unwrap(), Vec::<Vec<u8>>::new());
        assert_eq!(split_path("/").unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn single_segment() {
        assert_eq!(split_path("/a").unwrap(), vec![b"a".to_vec()]);
    }

    #[test]
    fn multi_segment_with_trailing_slash() {
        assert_eq!(split_path("/a/b/").unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn oversized_segment_is_not_found() {
        let long = "x".repeat(43);
        let path = format!("/{long}");
        assert!(matches!(split_path(&path).unwrap_err(), FatxError::NotFound));
    }

    #[test]
    fn dirname_and_basename() {
        let segs = split_path("/a/b/c.txt").unwrap();
        assert_eq!(dirname(&segs).unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(basename(&segs), vec![b"c.txt".to_vec()]);

        let root_child = split_path("/a").unwrap();
        assert_eq!(dirname(&root_child), None);
        assert_eq!(basename(&root_child), vec![b"a".to_vec()]);
    }
}
