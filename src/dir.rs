//! Directory iteration, path-segment matching and new-entry allocation.
//! `spec.md` §4.F.
//!
//! A directory is a chain of 16 KiB clusters, each an array of 256
//! directory entries. The root directory is synthesized (its chain starts
//! at cluster 1, `spec.md` §3).

use crate::cache::{ClusterCache, PageCache};
use crate::device::DeviceIo;
use crate::dirent::{DirEntry, DirEntryLoc, ENTRIES_PER_CLUSTER, ENTRY_SIZE, FILENAME_SZ_TERMINATOR};
use crate::error::{FatxError, Result};
use crate::fat::FatEngine;
use crate::geometry::Geometry;

/// `{cluster_no, entry_no}` iteration cursor over a directory's entries.
/// Owned by the caller (the directory iterator in `volume.rs`); it never
/// aliases cache memory, only cluster/index coordinates.
#[derive(Debug, Clone, Copy)]
pub struct DirCursor {
    pub cluster_no: u32,
    pub entry_no: u16,
}

impl DirCursor {
    pub fn at_start(first_cluster: u32) -> Self {
        DirCursor {
            cluster_no: first_cluster,
            entry_no: 0,
        }
    }
}

/// Advance the cursor one step, returning the entry it pointed at together
/// with its location, or `None` at end-of-directory.
///
/// Implements the state machine of `spec.md` §4.F exactly:
/// 1. If `entry_no == 256`, consult the FAT: EOC ends iteration, otherwise
///    move to the next cluster at `entry_no = 0`.
/// 2. Fetch the current cluster; read the entry at `entry_no`.
/// 3. A `0xFF` terminator ends iteration.
/// 4. Otherwise post-increment `entry_no` and return the entry (which may
///    be deleted/invalid; callers filter with `DirEntry::is_valid`).
pub fn advance<D: DeviceIo>(
    dev: &D,
    cluster_cache: &mut ClusterCache,
    page_cache: &mut PageCache,
    fat: &FatEngine,
    geometry: &Geometry,
    cursor: &mut DirCursor,
) -> Result<Option<(DirEntry, DirEntryLoc)>> {
    if cursor.entry_no as usize == ENTRIES_PER_CLUSTER {
        let next = fat.read_entry(dev, page_cache, geometry, cursor.cluster_no as u64)?;
        if fat.is_eoc(next) {
            return Ok(None);
        }
        cursor.cluster_no = next;
        cursor.entry_no = 0;
    }

    let loc = DirEntryLoc {
        cluster_no: cursor.cluster_no,
        entry_no: cursor.entry_no,
    };

    let offset = geometry.cluster_offset(cursor.cluster_no as u64);
    let cluster = cluster_cache.get_cluster(dev, cursor.cluster_no as u64, offset)?;
    let entry_offset = loc.byte_offset();
    let entry = DirEntry::parse(&cluster[entry_offset..entry_offset + ENTRY_SIZE]);

    if entry.is_terminator() {
        return Ok(None);
    }

    cursor.entry_no += 1;
    Ok(Some((entry, loc)))
}

/// Find a single name within one directory cluster chain. Matches
/// byte-for-byte, length-limited by the stored `filename_sz`, against
/// valid (non-deleted, non-terminator) entries only.
pub fn find_in_dir<D: DeviceIo>(
    dev: &D,
    cluster_cache: &mut ClusterCache,
    page_cache: &mut PageCache,
    fat: &FatEngine,
    geometry: &Geometry,
    dir_first_cluster: u32,
    name: &[u8],
) -> Result<Option<(DirEntry, DirEntryLoc)>> {
    let mut cursor = DirCursor::at_start(dir_first_cluster);
    while let Some((entry, loc)) = advance(dev, cluster_cache, page_cache, fat, geometry, &mut cursor)? {
        if entry.is_valid() && entry.name_bytes() == name {
            return Ok(Some((entry, loc)));
        }
    }
    Ok(None)
}

/// Resolve a non-empty list of path segments, starting from `start_cluster`
/// (the directory to search the first segment in). Each successful match
/// becomes the base for the next segment. Returns the final match, or
/// `None` if any segment is missing.
///
/// A `null`/empty segment list is handled by the caller (it denotes the
/// root, which has no resolvable directory entry of its own).
pub fn resolve_path<D: DeviceIo>(
    dev: &D,
    cluster_cache: &mut ClusterCache,
    page_cache: &mut PageCache,
    fat: &FatEngine,
    geometry: &Geometry,
    start_cluster: u32,
    segments: &[Vec<u8>],
) -> Result<Option<(DirEntry, DirEntryLoc)>> {
    let mut current_cluster = start_cluster;
    let mut last = None;

    for segment in segments {
        match find_in_dir(dev, cluster_cache, page_cache, fat, geometry, current_cluster, segment)? {
            Some((entry, loc)) => {
                current_cluster = entry.first_cluster;
                last = Some((entry, loc));
            }
            None => return Ok(None),
        }
    }

    Ok(last)
}

/// Find or create a writable slot in `dir_first_cluster`'s chain, per
/// `spec.md` §4.F:
/// - a deleted slot mid-cluster is reused in place;
/// - the terminator slot in an existing cluster is reused (the next slot
///   is already `0xFF` from `init_dir_cluster`, so the terminator invariant
///   holds with no extra write);
/// - if the chain's last cluster is full and its FAT entry is EOC, a fresh
///   cluster is allocated, chained in, and initialized.
pub fn allocate_entry_slot<D: DeviceIo>(
    dev: &D,
    cluster_cache: &mut ClusterCache,
    page_cache: &mut PageCache,
    fat: &FatEngine,
    geometry: &Geometry,
    dir_first_cluster: u32,
) -> Result<DirEntryLoc> {
    let mut cluster_no = dir_first_cluster;

    loop {
        let offset = geometry.cluster_offset(cluster_no as u64);
        let cluster = cluster_cache.get_cluster(dev, cluster_no as u64, offset)?;

        for entry_no in 0..ENTRIES_PER_CLUSTER as u16 {
            let entry_offset = entry_no as usize * ENTRY_SIZE;
            let entry = DirEntry::parse(&cluster[entry_offset..entry_offset + ENTRY_SIZE]);
            if entry.is_deleted() || entry.is_terminator() {
                return Ok(DirEntryLoc { cluster_no, entry_no });
            }
        }

        let next = fat.read_entry(dev, page_cache, geometry, cluster_no as u64)?;
        if !fat.is_eoc(next) {
            cluster_no = next;
            continue;
        }

        log::debug!("directory at cluster {dir_first_cluster} is full, allocating a new cluster");
        let new_cluster = fat.find_free_cluster(dev, page_cache, geometry, cluster_no as u64)?;
        if new_cluster == 0 {
            return Err(FatxError::NoSpace);
        }
        fat.write_entry(dev, page_cache, geometry, cluster_no as u64, new_cluster)?;
        fat.write_entry(dev, page_cache, geometry, new_cluster as u64, eoc_marker(geometry))?;
        init_dir_cluster(dev, cluster_cache, geometry, new_cluster)?;

        return Ok(DirEntryLoc {
            cluster_no: new_cluster,
            entry_no: 0,
        });
    }
}

/// Zero a freshly allocated directory cluster and mark every one of its 256
/// entries as never-used (`filename_sz = 0xFF`).
pub fn init_dir_cluster<D: DeviceIo>(
    dev: &D,
    cluster_cache: &mut ClusterCache,
    geometry: &Geometry,
    cluster_no: u32,
) -> Result<()> {
    let offset = geometry.cluster_offset(cluster_no as u64);
    let cluster = cluster_cache.get_cluster_mut(dev, cluster_no as u64, offset)?;
    cluster.fill(0);
    for entry_no in 0..ENTRIES_PER_CLUSTER {
        cluster[entry_no * ENTRY_SIZE] = FILENAME_SZ_TERMINATOR;
    }
    Ok(())
}

/// Write a parsed `DirEntry` back to its location, marking the cluster
/// dirty.
pub fn write_entry_at<D: DeviceIo>(
    dev: &D,
    cluster_cache: &mut ClusterCache,
    geometry: &Geometry,
    loc: DirEntryLoc,
    entry: &DirEntry,
) -> Result<()> {
    let offset = geometry.cluster_offset(loc.cluster_no as u64);
    let cluster = cluster_cache.get_cluster_mut(dev, loc.cluster_no as u64, offset)?;
    let entry_offset = loc.byte_offset();
    cluster[entry_offset..entry_offset + ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
    Ok(())
}

fn eoc_marker(geometry: &Geometry) -> u32 {
    match geometry.variant {
        crate::geometry::FatVariant::Fatx16 => 0xFFFF,
        crate::geometry::FatVariant::Fatx32 => 0xFFFF_FFFF,
    }
}
