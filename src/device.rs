//! Positioned reads/writes against the backing store, and the narrow
//! device-geometry capability the core consumes. Block-device size/geometry
//! discovery beyond "it's a regular file" is out of scope (`spec.md` §1) —
//! callers targeting a raw block device supply their own `DeviceIo`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// The device collaborator interface named in `spec.md` §6: positioned I/O
/// plus enough geometry to derive cluster count.
pub trait DeviceIo {
    /// Total size of the backing store, in bytes.
    fn size_in_bytes(&self) -> io::Result<u64>;

    /// Block size of the backing store, if the device exposes one. `None`
    /// for a plain file, where geometry is derived from `size_in_bytes`
    /// alone per `spec.md` §4.A.
    fn block_size(&self) -> Option<usize> {
        None
    }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Write all of `buf` starting at `offset`.
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

/// A `DeviceIo` backed by a regular file or block-special file, opened via
/// `std::fs::File`.
#[derive(Debug)]
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    /// Open an existing image/device for read-write access.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(FileDevice { file })
    }

    /// Open an existing image/device for read-only access.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(FileDevice { file })
    }
}

impl DeviceIo for FileDevice {
    fn size_in_bytes(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        log::trace!("read_at(offset={offset}, len={})", buf.len());
        self.file.read_exact_at(buf, offset)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        log::trace!("write_at(offset={offset}, len={})", buf.len());
        self.file.write_all_at(buf, offset)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::DeviceIo;
    use parking_lot::Mutex;
    use std::io;

    /// An in-memory `DeviceIo`, used by unit/integration tests to avoid
    /// touching the filesystem for every scenario.
    pub struct MemDevice {
        buf: Mutex<Vec<u8>>,
    }

    impl MemDevice {
        pub fn new(buf: Vec<u8>) -> Self {
            MemDevice { buf: Mutex::new(buf) }
        }

        pub fn into_inner(self) -> Vec<u8> {
            self.buf.into_inner()
        }

        pub fn snapshot(&self) -> Vec<u8> {
            self.buf.lock().clone()
        }
    }

    impl DeviceIo for MemDevice {
        fn size_in_bytes(&self) -> io::Result<u64> {
            Ok(self.buf.lock().len() as u64)
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
            let guard = self.buf.lock();
            let offset = offset as usize;
            if offset + buf.len() > guard.len() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of device"));
            }
            buf.copy_from_slice(&guard[offset..offset + buf.len()]);
            Ok(())
        }

        fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
            let mut guard = self.buf.lock();
            let offset = offset as usize;
            if offset + buf.len() > guard.len() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "write past end of device"));
            }
            guard[offset..offset + buf.len()].copy_from_slice(buf);
            Ok(())
        }
    }
}
