//! Maps a file offset to the owning cluster by following the FAT chain.
//! `spec.md` §4.E.

use crate::device::DeviceIo;
use crate::error::{FatxError, Result};
use crate::fat::FatEngine;
use crate::cache::PageCache;
use crate::geometry::{Geometry, CLUSTER_SIZE};

/// Advance `file_offset / cluster_size` hops from `first_cluster` along the
/// FAT chain. Returns the landed cluster and the intra-cluster byte offset.
///
/// Stops early with `BadDescriptor` if EOC or free is encountered before the
/// hop count is reached (a corrupt/truncated chain).
pub fn walk<D: DeviceIo>(
    dev: &D,
    cache: &mut PageCache,
    engine: &FatEngine,
    geometry: &Geometry,
    first_cluster: u32,
    file_offset: u64,
) -> Result<(u32, u64)> {
    let hops = file_offset / CLUSTER_SIZE;
    let intra_offset = file_offset % CLUSTER_SIZE;

    let mut current = first_cluster;
    for _ in 0..hops {
        let v = engine.read_entry(dev, cache, geometry, current as u64)?;
        if engine.is_eoc(v) || engine.is_free(v) {
            log::warn!("chain walk: truncated chain at cluster {current} (hop value {v:#x})");
            return Err(FatxError::BadDescriptor);
        }
        current = v;
    }

    Ok((current, intra_offset))
}
