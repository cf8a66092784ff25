//! Error kinds raised by the FATX driver, and the negative-errno mapping
//! consumers speaking the C library's original calling convention expect.

use thiserror::Error;

/// Errors raised while resolving paths, walking cluster chains or touching
/// the backing device.
///
/// `Io` is not part of the original C library's error set (which folds every
/// I/O failure into a single negative errno) but the teacher crate already
/// separates I/O failure from format/validation failure
/// (`BootSectorInitIoError::{Io,Init}`), so this crate keeps that split.
#[derive(Debug, Error)]
pub enum FatxError {
    /// A path component was missing during resolution, or the target of a
    /// read/write/stat doesn't exist, or `mkfile` raced an existing entry.
    #[error("path not found")]
    NotFound,
    /// `read` with `offset >= size`, or `write` with `offset > size`.
    #[error("offset beyond end of file")]
    Overflow,
    /// The cluster chain ended (EOC or free) before the declared file size
    /// was reached.
    #[error("corrupt cluster chain")]
    BadDescriptor,
    /// No free cluster was available in the FAT when one was required.
    #[error("no space left on device")]
    NoSpace,
    /// `open` failed: bad path, permission, or malformed geometry.
    #[error("failed to initialize volume: {0}")]
    InitFailure(String),
    /// The underlying device read or write failed.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FatxError {
    /// Negative `errno`-like value, matching the C library's return
    /// convention (`spec.md` §6/§7) for callers that still speak it.
    pub fn as_errno(&self) -> i32 {
        match self {
            FatxError::NotFound => -libc_enoent(),
            FatxError::Overflow => -libc_eoverflow(),
            FatxError::BadDescriptor => -libc_ebadf(),
            FatxError::NoSpace => -libc_enospc(),
            FatxError::InitFailure(_) | FatxError::Io(_) => -libc_eio(),
        }
    }
}

/// Public entry points return `bytes | -errno`, so we need the small set of
/// errno values the spec names without depending on the `libc` crate
/// (the core has no other use for it).
const fn libc_enoent() -> i32 {
    2
}
const fn libc_eio() -> i32 {
    5
}
const fn libc_ebadf() -> i32 {
    9
}
const fn libc_enospc() -> i32 {
    28
}
const fn libc_eoverflow() -> i32 {
    75
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, FatxError>;
