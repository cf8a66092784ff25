//! Two independent direct-mapped write-back caches fronting all disk I/O:
//! a 32-slot FAT-page cache (4 KiB pages) and a 32-slot data-cluster cache
//! (16 KiB clusters). `spec.md` §4.B/§4.C.
//!
//! Both are a trivial direct-mapped write-back cache: correctness is easy to
//! reason about, at the cost of conflict misses on access patterns that
//! happen to collide modulo 32. An implementation may upgrade to
//! set-associative LRU without changing the external contract (eventual
//! flush on close, visible-after-write within the same handle).

use crate::device::DeviceIo;
use crate::geometry::{CLUSTER_SIZE, FAT_OFFSET, FAT_PAGE_SIZE};
use std::io;

const SLOT_COUNT: usize = 32;

struct Slot<const N: usize> {
    /// `None` until the slot is first populated.
    tag: Option<u64>,
    /// Absolute on-disk byte offset the slot was populated from. Kept
    /// alongside `tag` rather than recomputed as `tag * N`, since the tag
    /// space (FAT page number or cluster number) doesn't start at byte 0 —
    /// the FAT region starts at `FAT_OFFSET` and the data region at
    /// `Geometry::data_start`.
    byte_offset: u64,
    dirty: bool,
    data: [u8; N],
}

impl<const N: usize> Slot<N> {
    fn empty() -> Self {
        Slot {
            tag: None,
            byte_offset: 0,
            dirty: false,
            data: [0u8; N],
        }
    }
}

/// A direct-mapped write-back cache of fixed-size pages, keyed by `tag mod
/// SLOT_COUNT`. Generic over page size so `PageCache` and `ClusterCache` are
/// instantiations of the same logic, matching the teacher's habit of
/// sharing one generic shape between its FAT-entry and directory-entry code.
struct DirectMappedCache<const N: usize> {
    slots: Vec<Slot<N>>,
    kind: &'static str,
}

impl<const N: usize> DirectMappedCache<N> {
    fn new(kind: &'static str) -> Self {
        let mut slots = Vec::with_capacity(SLOT_COUNT);
        slots.resize_with(SLOT_COUNT, Slot::empty);
        DirectMappedCache { slots, kind }
    }

    fn slot_index(&self, tag: u64) -> usize {
        (tag % SLOT_COUNT as u64) as usize
    }

    /// Ensure the page/cluster at byte `offset` (`tag`) is resident,
    /// evicting and flushing the prior occupant if the slot is dirty and
    /// holds a different tag. Returns the slot index.
    fn ensure_resident<D: DeviceIo>(&mut self, dev: &D, tag: u64, byte_offset: u64) -> io::Result<usize> {
        let idx = self.slot_index(tag);
        if self.slots[idx].tag == Some(tag) {
            return Ok(idx);
        }

        if let Some(prev_tag) = self.slots[idx].tag {
            if self.slots[idx].dirty {
                log::debug!("{} cache: evicting dirty tag {} from slot {}", self.kind, prev_tag, idx);
                self.flush_slot(dev, idx)?;
            }
        }

        dev.read_at(byte_offset, &mut self.slots[idx].data)?;
        self.slots[idx].tag = Some(tag);
        self.slots[idx].byte_offset = byte_offset;
        self.slots[idx].dirty = false;
        Ok(idx)
    }

    fn flush_slot<D: DeviceIo>(&mut self, dev: &D, idx: usize) -> io::Result<()> {
        let slot = &mut self.slots[idx];
        if slot.tag.is_some() && slot.dirty {
            dev.write_at(slot.byte_offset, &slot.data)?;
            slot.dirty = false;
        }
        Ok(())
    }

    fn flush_all<D: DeviceIo>(&mut self, dev: &D) -> io::Result<()> {
        for idx in 0..self.slots.len() {
            self.flush_slot(dev, idx)?;
        }
        log::debug!("{} cache: flushed all dirty slots", self.kind);
        Ok(())
    }

    fn data(&self, idx: usize) -> &[u8; N] {
        &self.slots[idx].data
    }

    fn data_mut(&mut self, idx: usize) -> &mut [u8; N] {
        self.slots[idx].dirty = true;
        &mut self.slots[idx].data
    }
}

/// Caches FAT pages (`FAT_PAGE_SIZE` bytes each), keyed by `page_no`.
pub struct PageCache {
    inner: DirectMappedCache<{ FAT_PAGE_SIZE as usize }>,
}

impl PageCache {
    /// Construct the cache, preloading page 0 as the open-time prefetch
    /// named in `spec.md` §4.B.
    pub fn new<D: DeviceIo>(dev: &D) -> io::Result<Self> {
        let mut inner = DirectMappedCache::new("fat-page");
        inner.ensure_resident(dev, 0, FAT_OFFSET)?;
        Ok(PageCache { inner })
    }

    /// Fetch page `page_no`, returning its bytes for reading. `page_no` is
    /// relative to the start of the FAT region (`FAT_OFFSET`), not the
    /// start of the device.
    pub fn get_page<D: DeviceIo>(&mut self, dev: &D, page_no: u64) -> io::Result<&[u8; FAT_PAGE_SIZE as usize]> {
        let idx = self.inner.ensure_resident(dev, page_no, FAT_OFFSET + page_no * FAT_PAGE_SIZE)?;
        Ok(self.inner.data(idx))
    }

    /// Fetch page `page_no` for mutation; marks the slot dirty.
    pub fn get_page_mut<D: DeviceIo>(
        &mut self,
        dev: &D,
        page_no: u64,
    ) -> io::Result<&mut [u8; FAT_PAGE_SIZE as usize]> {
        let idx = self.inner.ensure_resident(dev, page_no, FAT_OFFSET + page_no * FAT_PAGE_SIZE)?;
        Ok(self.inner.data_mut(idx))
    }

    /// Flush every dirty slot. Called on volume close.
    pub fn flush_all<D: DeviceIo>(&mut self, dev: &D) -> io::Result<()> {
        self.inner.flush_all(dev)
    }
}

/// Caches data clusters (`CLUSTER_SIZE` bytes each), keyed by `cluster_no`.
pub struct ClusterCache {
    inner: DirectMappedCache<{ CLUSTER_SIZE as usize }>,
}

impl ClusterCache {
    pub fn new() -> Self {
        ClusterCache {
            inner: DirectMappedCache::new("data-cluster"),
        }
    }

    /// Fetch cluster `cluster_no` (its absolute on-disk byte offset is
    /// `byte_offset`), returning its bytes for reading.
    pub fn get_cluster<D: DeviceIo>(
        &mut self,
        dev: &D,
        cluster_no: u64,
        byte_offset: u64,
    ) -> io::Result<&[u8; CLUSTER_SIZE as usize]> {
        let idx = self.inner.ensure_resident(dev, cluster_no, byte_offset)?;
        Ok(self.inner.data(idx))
    }

    /// Fetch cluster `cluster_no` for mutation; marks the slot dirty.
    pub fn get_cluster_mut<D: DeviceIo>(
        &mut self,
        dev: &D,
        cluster_no: u64,
        byte_offset: u64,
    ) -> io::Result<&mut [u8; CLUSTER_SIZE as usize]> {
        let idx = self.inner.ensure_resident(dev, cluster_no, byte_offset)?;
        Ok(self.inner.data_mut(idx))
    }

    /// Flush every dirty slot. Called on volume close.
    pub fn flush_all<D: DeviceIo>(&mut self, dev: &D) -> io::Result<()> {
        self.inner.flush_all(dev)
    }
}

impl Default for ClusterCache {
    fn default() -> Self {
        Self::new()
    }
}
