//! The `Volume` handle: `stat`/`read`/`write`/`mkfile`/`opendir`/`readdir`/
//! `closedir`, composed over the FAT engine, caches and directory layer
//! under a single per-volume lock. `spec.md` §4.H/§4.I.

use crate::cache::{ClusterCache, PageCache};
use crate::chain;
use crate::device::DeviceIo;
use crate::dir::{self, DirCursor};
use crate::dirent::{DirEntry, DirEntryLoc};
use crate::error::{FatxError, Result};
use crate::fat::FatEngine;
use crate::geometry::{FatVariant, Geometry, CLUSTER_SIZE};
use crate::path;
use parking_lot::Mutex;

/// Chain start of the synthesized root directory (`spec.md` §3).
const ROOT_CLUSTER: u32 = 1;

const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;

/// Mount-time options, mirroring the original `fatx_options_t`
/// (`original_source/libfatx.h`: `uid_t user; gid_t group; uint32_t
/// filePerm; uint32_t mode;`).
#[derive(Debug, Clone, Copy)]
pub struct VolumeOptions {
    pub uid: u32,
    pub gid: u32,
    /// Low 9 bits are used; higher bits are ignored (`spec.md` §6).
    pub file_perm: u32,
    pub mode: u32,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        VolumeOptions {
            uid: 0,
            gid: 0,
            file_perm: 0o644,
            mode: 0,
        }
    }
}

/// The subset of `struct stat` this core populates (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub atime: i64,
    pub mtime: i64,
}

/// An open directory iterator, returned by `opendir`. Holds only cursor
/// coordinates, never a reference into cache memory (`spec.md` §9).
pub struct DirHandle {
    cursor: DirCursor,
}

/// Caches guarded by the volume lock. Every public `Volume` method locks
/// this once and never re-enters the lock; internal helpers take `&mut
/// VolumeInner`'s pieces directly instead of re-locking (`SPEC_FULL.md`
/// §4.I).
struct VolumeInner {
    page_cache: PageCache,
    cluster_cache: ClusterCache,
}

/// An open FATX volume.
pub struct Volume<D: DeviceIo> {
    device: D,
    geometry: Geometry,
    fat: FatEngine,
    options: VolumeOptions,
    inner: Mutex<VolumeInner>,
}

impl<D: DeviceIo> Volume<D> {
    /// Open a volume: derive geometry from the device (`spec.md` §4.A),
    /// build the FAT engine, and preload the caches.
    pub fn open(device: D, options: VolumeOptions) -> Result<Self> {
        let n_clusters = match device.block_size() {
            Some(block_size) => {
                let block_count = device.size_in_bytes()? / block_size as u64;
                Geometry::cluster_count_for_block_device(block_count, block_size as u64)
            }
            None => Geometry::cluster_count_for_file_size(device.size_in_bytes()?),
        };

        if n_clusters == 0 {
            return Err(FatxError::InitFailure(
                "device is too small to hold a single cluster".into(),
            ));
        }

        let geometry = Geometry::from_cluster_count(n_clusters);
        log::info!(
            "opening volume: {n_clusters} clusters, variant {:?}, data_start {:#x}",
            geometry.variant,
            geometry.data_start
        );

        let fat = FatEngine::new(&geometry);
        let page_cache = PageCache::new(&device)?;
        let cluster_cache = ClusterCache::new();

        Ok(Volume {
            device,
            geometry,
            fat,
            options,
            inner: Mutex::new(VolumeInner {
                page_cache,
                cluster_cache,
            }),
        })
    }

    /// Flush every dirty cache slot. Consumes the handle, matching the
    /// original's `fatx_free` releasing the handle on close.
    pub fn close(self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.page_cache.flush_all(&self.device)?;
        inner.cluster_cache.flush_all(&self.device)?;
        Ok(())
    }

    fn root_entry(&self) -> DirEntry {
        let mut e = DirEntry::blank_terminator();
        e.filename_sz = 0;
        e.attributes = crate::dirent::ATTR_FOLDER;
        e.first_cluster = ROOT_CLUSTER;
        e.file_size = 0;
        e
    }

    /// Resolve `path` to its directory entry. `Ok(None)` denotes the root
    /// (an empty segment list has no directory entry of its own); any other
    /// unmatched path is `Err(NotFound)` rather than `Ok(None)`, so callers
    /// can't confuse "it's the root" with "it doesn't exist".
    fn resolve(&self, inner: &mut VolumeInner, path: &str) -> Result<Option<(DirEntry, DirEntryLoc)>> {
        let segments = path::split_path(path)?;
        if segments.is_empty() {
            return Ok(None);
        }
        let found = dir::resolve_path(
            &self.device,
            &mut inner.cluster_cache,
            &mut inner.page_cache,
            &self.fat,
            &self.geometry,
            ROOT_CLUSTER,
            &segments,
        )?;
        match found {
            Some(f) => Ok(Some(f)),
            None => Err(FatxError::NotFound),
        }
    }

    /// `stat(path)`, `spec.md` §4.H.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        let mut inner = self.inner.lock();
        let perm = self.options.file_perm & 0o777;

        let entry = match self.resolve(&mut inner, path)? {
            None => self.root_entry(),
            Some((entry, _)) => entry,
        };

        let is_root = path::split_path(path)?.is_empty();
        let mode = if is_root || entry.is_folder() { S_IFDIR } else { S_IFREG } | perm;

        let (atime, mtime) = if is_root {
            (0, 0)
        } else {
            (
                crate::datetime::FatDateTime::from_raw(entry.access_date, entry.access_time).to_unix_timestamp(),
                crate::datetime::FatDateTime::from_raw(entry.modification_date, entry.modification_time)
                    .to_unix_timestamp(),
            )
        };

        Ok(Stat {
            mode,
            size: entry.file_size as u64,
            uid: self.options.uid,
            gid: self.options.gid,
            nlink: 1,
            atime,
            mtime,
        })
    }

    /// `read(path, buf, offset)`, `spec.md` §4.H. Returns the number of
    /// bytes actually copied into `buf` (`min(buf.len(), fileSize - offset)`).
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock();

        let (entry, _) = match self.resolve(&mut inner, path)? {
            None => return Err(FatxError::NotFound),
            Some(found) => found,
        };

        let file_size = entry.file_size as u64;
        if offset >= file_size {
            return Err(FatxError::Overflow);
        }

        let to_read = (buf.len() as u64).min(file_size - offset) as usize;
        let (mut current, mut intra) = chain::walk(
            &self.device,
            &mut inner.page_cache,
            &self.fat,
            &self.geometry,
            entry.first_cluster,
            offset,
        )?;

        let mut done = 0usize;
        while done < to_read {
            let chunk = (to_read - done).min((CLUSTER_SIZE - intra) as usize);
            let cluster_offset = self.geometry.cluster_offset(current as u64);
            let cluster = inner.cluster_cache.get_cluster(&self.device, current as u64, cluster_offset)?;
            let intra_usize = intra as usize;
            buf[done..done + chunk].copy_from_slice(&cluster[intra_usize..intra_usize + chunk]);
            done += chunk;
            intra = 0;

            if done < to_read {
                let next = self.fat.read_entry(&self.device, &mut inner.page_cache, &self.geometry, current as u64)?;
                if self.fat.is_eoc(next) || self.fat.is_free(next) {
                    log::warn!("read: chain ended early at cluster {current}, {done}/{to_read} bytes copied");
                    return Err(FatxError::BadDescriptor);
                }
                current = next;
            }
        }

        Ok(done)
    }

    /// `write(path, buf, offset)`, `spec.md` §4.H. Grows the chain as
    /// needed; returns the number of bytes written (always `buf.len()` on
    /// success).
    pub fn write(&self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock();

        let (mut entry, loc) = match self.resolve(&mut inner, path)? {
            None => return Err(FatxError::NotFound),
            Some(found) => found,
        };

        let file_size = entry.file_size as u64;
        if offset > file_size {
            return Err(FatxError::Overflow);
        }

        let hops = offset / CLUSTER_SIZE;
        let mut current = entry.first_cluster;
        for _ in 0..hops {
            current = self.advance_or_grow(&mut inner, current)?;
        }

        let mut intra = (offset % CLUSTER_SIZE) as usize;
        let mut done = 0usize;
        loop {
            let chunk = (buf.len() - done).min(CLUSTER_SIZE as usize - intra);
            let cluster_offset = self.geometry.cluster_offset(current as u64);
            let cluster = inner
                .cluster_cache
                .get_cluster_mut(&self.device, current as u64, cluster_offset)?;
            cluster[intra..intra + chunk].copy_from_slice(&buf[done..done + chunk]);
            done += chunk;

            if done == buf.len() {
                break;
            }
            current = self.advance_or_grow(&mut inner, current)?;
            intra = 0;
        }

        let new_size = file_size.max(offset + done as u64);
        entry.file_size = new_size as u32;
        dir::write_entry_at(&self.device, &mut inner.cluster_cache, &self.geometry, loc, &entry)?;

        Ok(done)
    }

    /// Step from `cluster_no` to the next cluster in its chain, allocating
    /// and linking a fresh one if the FAT entry is EOC (`spec.md` §4.H
    /// write bullet: "read the outgoing FAT entry; if EOC, allocate a free
    /// cluster, link ...; if no free cluster, return ENOSPC").
    fn advance_or_grow(&self, inner: &mut VolumeInner, cluster_no: u32) -> Result<u32> {
        let next = self
            .fat
            .read_entry(&self.device, &mut inner.page_cache, &self.geometry, cluster_no as u64)?;

        if self.fat.is_free(next) {
            log::warn!("write: encountered a free FAT entry mid-chain at cluster {cluster_no}");
            return Err(FatxError::BadDescriptor);
        }

        if !self.fat.is_eoc(next) {
            return Ok(next);
        }

        let new_cluster =
            self.fat
                .find_free_cluster(&self.device, &mut inner.page_cache, &self.geometry, cluster_no as u64)?;
        if new_cluster == 0 {
            return Err(FatxError::NoSpace);
        }

        self.fat
            .write_entry(&self.device, &mut inner.page_cache, &self.geometry, cluster_no as u64, new_cluster)?;
        self.fat.write_entry(
            &self.device,
            &mut inner.page_cache,
            &self.geometry,
            new_cluster as u64,
            eoc_marker(self.geometry.variant),
        )?;
        log::debug!("write: grew chain, cluster {cluster_no} -> {new_cluster}");
        Ok(new_cluster)
    }

    /// `mkfile(path)`, `spec.md` §4.H.
    pub fn mkfile(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        let segments = path::split_path(path)?;
        if segments.is_empty() {
            return Err(FatxError::NotFound);
        }

        let basename = path::basename(&segments);
        let name = &basename[0];

        let parent_cluster = match path::dirname(&segments) {
            None => ROOT_CLUSTER,
            Some(parent_segments) => {
                let parent = dir::resolve_path(
                    &self.device,
                    &mut inner.cluster_cache,
                    &mut inner.page_cache,
                    &self.fat,
                    &self.geometry,
                    ROOT_CLUSTER,
                    &parent_segments,
                )?;
                match parent {
                    Some((entry, _)) if entry.is_folder() => entry.first_cluster,
                    // Parent missing, or exists but isn't a folder: both
                    // surface as NotFound, preserving the original's
                    // observable (likely unintended) behavior rather than
                    // inventing an EEXIST/ENOTDIR distinction it never had.
                    _ => return Err(FatxError::NotFound),
                }
            }
        };

        let existing = dir::find_in_dir(
            &self.device,
            &mut inner.cluster_cache,
            &mut inner.page_cache,
            &self.fat,
            &self.geometry,
            parent_cluster,
            name,
        )?;
        if existing.is_some() {
            // Preserves the original's ENOENT-on-existing-file behavior
            // rather than EEXIST (`SPEC_FULL.md` §9 decision 3).
            return Err(FatxError::NotFound);
        }

        let new_cluster = self.fat.find_free_cluster(
            &self.device,
            &mut inner.page_cache,
            &self.geometry,
            parent_cluster as u64,
        )?;
        if new_cluster == 0 {
            return Err(FatxError::NoSpace);
        }
        self.fat.write_entry(
            &self.device,
            &mut inner.page_cache,
            &self.geometry,
            new_cluster as u64,
            eoc_marker(self.geometry.variant),
        )?;

        let slot = dir::allocate_entry_slot(
            &self.device,
            &mut inner.cluster_cache,
            &mut inner.page_cache,
            &self.fat,
            &self.geometry,
            parent_cluster,
        )?;

        let mut entry = DirEntry::blank_terminator();
        entry.filename_sz = name.len() as u8;
        entry.filename[..name.len()].copy_from_slice(name);
        entry.first_cluster = new_cluster;
        entry.file_size = 0;

        dir::write_entry_at(&self.device, &mut inner.cluster_cache, &self.geometry, slot, &entry)?;
        log::debug!("mkfile: created {path:?} at cluster {new_cluster}");
        Ok(())
    }

    /// `opendir(path)`, `spec.md` §4.H: resolves `path`, returning
    /// `NotFound` if it doesn't exist or isn't a folder.
    pub fn opendir(&self, path: &str) -> Result<DirHandle> {
        let mut inner = self.inner.lock();

        let first_cluster = match self.resolve(&mut inner, path)? {
            None => ROOT_CLUSTER,
            Some((entry, _)) if entry.is_folder() => entry.first_cluster,
            Some(_) => return Err(FatxError::NotFound),
        };

        Ok(DirHandle {
            cursor: DirCursor::at_start(first_cluster),
        })
    }

    /// `readdir(iter)`, `spec.md` §4.H: returns the next valid entry, or
    /// `None` at end-of-directory. Skips deleted/invalid entries silently.
    pub fn readdir(&self, handle: &mut DirHandle) -> Result<Option<DirEntry>> {
        let mut inner = self.inner.lock();

        loop {
            let next = dir::advance(
                &self.device,
                &mut inner.cluster_cache,
                &mut inner.page_cache,
                &self.fat,
                &self.geometry,
                &mut handle.cursor,
            )?;
            match next {
                None => return Ok(None),
                Some((entry, _)) if entry.is_valid() => return Ok(Some(entry)),
                Some(_) => continue,
            }
        }
    }

    /// `closedir(iter)`, `spec.md` §4.H. Nothing to free: `DirHandle` owns
    /// no cache-aliasing state, unlike the original's heap-allocated
    /// dirent list.
    pub fn closedir(&self, _handle: DirHandle) -> Result<()> {
        Ok(())
    }
}

fn eoc_marker(variant: FatVariant) -> u32 {
    match variant {
        FatVariant::Fatx16 => 0xFFFF,
        FatVariant::Fatx32 => 0xFFFF_FFFF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::MemDevice;

    fn new_volume(n_clusters: u64) -> Volume<MemDevice> {
        // `open` derives cluster count as `size_in_bytes() >> 14`, so a
        // plain-file image of exactly `n_clusters * CLUSTER_SIZE` bytes
        // round-trips back to `n_clusters`.
        let dev = MemDevice::new(vec![0u8; (n_clusters * CLUSTER_SIZE) as usize]);

        let volume = Volume::open(dev, VolumeOptions::default()).unwrap();
        // root's own FAT entry is EOC (it's a single-cluster directory to
        // start with).
        {
            let mut inner = volume.inner.lock();
            volume
                .fat
                .write_entry(&volume.device, &mut inner.page_cache, &volume.geometry, ROOT_CLUSTER as u64, eoc_marker(volume.geometry.variant))
                .unwrap();
            dir::init_dir_cluster(&volume.device, &mut inner.cluster_cache, &volume.geometry, ROOT_CLUSTER).unwrap();
        }
        volume
    }

    #[test]
    fn stat_root_is_a_directory() {
        let volume = new_volume(64);
        let st = volume.stat("/").unwrap();
        assert_eq!(st.mode & S_IFDIR, S_IFDIR);
        assert_eq!(st.size, 0);
    }

    #[test]
    fn stat_on_missing_path_is_not_found() {
        let volume = new_volume(64);
        let err = volume.stat("/does-not-exist").unwrap_err();
        assert!(matches!(err, FatxError::NotFound));
    }

    #[test]
    fn opendir_on_missing_path_is_not_found() {
        let volume = new_volume(64);
        let err = volume.opendir("/does-not-exist").unwrap_err();
        assert!(matches!(err, FatxError::NotFound));
    }

    #[test]
    fn mkfile_then_stat_then_readdir() {
        let volume = new_volume(64);
        volume.mkfile("/x").unwrap();

        let st = volume.stat("/x").unwrap();
        assert_eq!(st.mode & S_IFREG, S_IFREG);
        assert_eq!(st.size, 0);

        let mut handle = volume.opendir("/").unwrap();
        let first = volume.readdir(&mut handle).unwrap().unwrap();
        assert_eq!(first.name_bytes(), b"x");
        assert!(volume.readdir(&mut handle).unwrap().is_none());
        volume.closedir(handle).unwrap();
    }

    #[test]
    fn round_trip_write_then_read() {
        let volume = new_volume(64);
        volume.mkfile("/x").unwrap();

        let written = volume.write("/x", b"hello", 0).unwrap();
        assert_eq!(written, 5);
        assert_eq!(volume.stat("/x").unwrap().size, 5);

        let mut buf = [0u8; 5];
        let read = volume.read("/x", &mut buf, 0).unwrap();
        assert_eq!(read, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_grows_across_a_cluster_boundary() {
        let volume = new_volume(64);
        volume.mkfile("/x").unwrap();
        volume.write("/x", &vec![0xAAu8; 16_380], 0).unwrap();
        assert_eq!(volume.stat("/x").unwrap().size, 16_380);

        let written = volume.write("/x", &vec![0xBBu8; 20], 16_380).unwrap();
        assert_eq!(written, 20);
        assert_eq!(volume.stat("/x").unwrap().size, 16_400);

        let mut buf = [0u8; 20];
        volume.read("/x", &mut buf, 16_380).unwrap();
        assert_eq!(buf, [0xBBu8; 20]);
    }

    #[test]
    fn read_past_end_of_file_is_overflow() {
        let volume = new_volume(64);
        volume.mkfile("/x").unwrap();
        volume.write("/x", b"hi", 0).unwrap();

        let mut buf = [0u8; 4];
        let err = volume.read("/x", &mut buf, 2).unwrap_err();
        assert!(matches!(err, FatxError::Overflow));
    }

    #[test]
    fn mkfile_on_existing_path_is_not_found() {
        let volume = new_volume(64);
        volume.mkfile("/x").unwrap();
        let err = volume.mkfile("/x").unwrap_err();
        assert!(matches!(err, FatxError::NotFound));
    }

    #[test]
    fn out_of_space_write_reports_no_space() {
        let volume = new_volume(4);
        volume.mkfile("/x").unwrap();

        // Exhaust every remaining free cluster.
        loop {
            let mut inner = volume.inner.lock();
            let free = volume
                .fat
                .find_free_cluster(&volume.device, &mut inner.page_cache, &volume.geometry, 0)
                .unwrap();
            if free == 0 {
                break;
            }
            volume
                .fat
                .write_entry(&volume.device, &mut inner.page_cache, &volume.geometry, free as u64, eoc_marker(volume.geometry.variant))
                .unwrap();
        }

        let err = volume.write("/x", &vec![0u8; 1], 0).unwrap_err();
        assert!(matches!(err, FatxError::NoSpace));
    }

    #[test]
    fn corruption_mid_chain_is_bad_descriptor() {
        let volume = new_volume(64);
        volume.mkfile("/x").unwrap();
        volume.write("/x", &vec![0xAAu8; 16_380 + 20], 0).unwrap();

        // Manually clobber the mid-chain FAT link with "free".
        let (first_cluster, _) = {
            let mut inner = volume.inner.lock();
            let entry = dir::find_in_dir(
                &volume.device,
                &mut inner.cluster_cache,
                &mut inner.page_cache,
                &volume.fat,
                &volume.geometry,
                ROOT_CLUSTER,
                b"x",
            )
            .unwrap()
            .unwrap();
            (entry.0.first_cluster, entry.1)
        };
        {
            let mut inner = volume.inner.lock();
            volume
                .fat
                .write_entry(&volume.device, &mut inner.page_cache, &volume.geometry, first_cluster as u64, 0)
                .unwrap();
        }

        let mut buf = [0u8; 4];
        let err = volume.read("/x", &mut buf, 16_390).unwrap_err();
        assert!(matches!(err, FatxError::BadDescriptor));
    }
}
