//! Shared fixture for integration tests: an in-memory `DeviceIo` and a
//! helper to open a `Volume` over a freshly-zeroed image of a given cluster
//! count.

use fatx::{DeviceIo, Geometry, Volume, VolumeOptions, CLUSTER_SIZE, FAT_OFFSET, FAT_PAGE_SIZE};
use std::io;
use std::sync::Mutex;

/// Install an `env_logger` subscriber for `RUST_LOG=fatx=trace`-style runs.
/// Idempotent: later calls across the same test binary are no-ops.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct MemDevice {
    buf: Mutex<Vec<u8>>,
}

impl MemDevice {
    pub fn new(buf: Vec<u8>) -> Self {
        MemDevice { buf: Mutex::new(buf) }
    }
}

impl DeviceIo for MemDevice {
    fn size_in_bytes(&self) -> io::Result<u64> {
        Ok(self.buf.lock().unwrap().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let guard = self.buf.lock().unwrap();
        let offset = offset as usize;
        if offset + buf.len() > guard.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of device"));
        }
        buf.copy_from_slice(&guard[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let mut guard = self.buf.lock().unwrap();
        let offset = offset as usize;
        if offset + buf.len() > guard.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "write past end of device"));
        }
        guard[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// Hand-build a minimal valid FATX image: the root directory (cluster 1) is
/// chained as a single, empty cluster (FAT entry = EOC, every directory
/// entry's `filenameSz` = terminator). This crate has no `mkfs`-equivalent
/// (out of scope, `spec.md` §1) — a real test image comes from a FATX
/// formatter; here we assemble the handful of bytes that formatter would
/// have written, using only the public `Geometry`/layout constants.
fn format_blank_image(n_clusters: u64) -> Vec<u8> {
    let geometry = Geometry::from_cluster_count(n_clusters);
    let mut buf = vec![0u8; (n_clusters * CLUSTER_SIZE) as usize];

    let entry_bytes = geometry.variant.entry_bytes();
    let (page_no, index) = geometry.fat_entry_location(1);
    let fat_byte_offset = (FAT_OFFSET + page_no * FAT_PAGE_SIZE + index * entry_bytes) as usize;
    let eoc = geometry.variant.eoc_threshold();
    match entry_bytes {
        2 => buf[fat_byte_offset..fat_byte_offset + 2].copy_from_slice(&(eoc as u16).to_be_bytes()),
        4 => buf[fat_byte_offset..fat_byte_offset + 4].copy_from_slice(&eoc.to_be_bytes()),
        _ => unreachable!("FAT entries are either 2 or 4 bytes"),
    }

    let root_offset = geometry.cluster_offset(1) as usize;
    for entry_no in 0..256usize {
        buf[root_offset + entry_no * 64] = 0xFF; // FILENAME_SZ_TERMINATOR
    }

    buf
}

/// Build and `open` a volume backed by a freshly formatted, empty
/// `n_clusters`-cluster image (`open` derives cluster count as
/// `size_in_bytes() >> 14` for a plain file, so sizing the device to
/// exactly `n_clusters * CLUSTER_SIZE` bytes round-trips back to
/// `n_clusters`).
pub fn open_blank_volume(n_clusters: u64) -> Volume<MemDevice> {
    init_logging();
    let dev = MemDevice::new(format_blank_image(n_clusters));
    Volume::open(dev, VolumeOptions::default()).expect("open should succeed on a freshly formatted image")
}
