/**
 * FATX filesystem
 *
 * A reader/writer for the FATX on-disk format used by the original Xbox.
 *
 * A FAT cluster is a fixed-size (16 KiB) unit of allocation in the data
 * region. The FAT is an array of 16- or 32-bit entries (one per cluster),
 * each either free, an end-of-chain marker, or a pointer to the next
 * cluster in the chain. Directory & file data is stored in the cluster
 * heap; a directory is just a chain of clusters holding an array of 64-byte
 * directory entries.
 *
 * General layout:
 *
 * .                       |offs        | size
 * FAT                     | 0x1000     | round_up(nClusters * entry_bytes, 4096)
 * data region (cluster 1) | data_start | nClusters * 16384
 *
 * Unlike most FAT variants, every multi-byte field on disk — FAT entries and
 * the numeric fields of a directory entry alike — is big-endian.
 *
 * This crate does not parse or validate the region before the FAT (where a
 * superblock would live in other FAT variants); geometry is derived purely
 * from the backing device's size.
 */
mod cache;
mod chain;
mod datetime;
mod device;
mod dir;
mod dirent;
mod error;
mod fat;
mod geometry;
mod path;
mod volume;

pub use device::{DeviceIo, FileDevice};
pub use dirent::DirEntry;
pub use error::{FatxError, Result};
pub use geometry::{FatVariant, Geometry, CLUSTER_SIZE, FATX32_MIN_CLUSTERS, FAT_OFFSET, FAT_PAGE_SIZE};
pub use volume::{DirHandle, Stat, Volume, VolumeOptions};
