//! The 64-byte on-disk directory entry (`spec.md` §3) and its in-memory
//! representation.
//!
//! Unlike the original C implementation — which hands back raw pointers
//! into cluster-cache memory that silently dangle on the next eviction —
//! `DirEntry` is an owned value copy. Callers that need to mutate the entry
//! back to disk pair it with a `DirEntryLoc`, a small `{cluster_no,
//! entry_no}` handle that's re-resolved through the cache on write instead
//! of aliasing it directly (`SPEC_FULL.md` §9, open-question decision 1).

pub const ENTRY_SIZE: usize = 64;
pub const MAX_NAME_LEN: usize = 42;
pub const ENTRIES_PER_CLUSTER: usize = 256;

pub const ATTR_FOLDER: u8 = 0x10;
pub const ATTR_HIDDEN: u8 = 0x02;

/// `filenameSz == 0xFF`: this and every later entry in the cluster has
/// never been used.
pub const FILENAME_SZ_TERMINATOR: u8 = 0xFF;
/// `filenameSz == 0xE5`: this slot is reusable; skip during iteration.
pub const FILENAME_SZ_DELETED: u8 = 0xE5;

/// One parsed 64-byte directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub filename_sz: u8,
    pub attributes: u8,
    /// Raw name bytes; only the first `filename_sz` are significant.
    pub filename: [u8; MAX_NAME_LEN],
    pub first_cluster: u32,
    pub file_size: u32,
    pub creation_date: u16,
    pub creation_time: u16,
    pub access_date: u16,
    pub access_time: u16,
    pub modification_date: u16,
    pub modification_time: u16,
}

impl DirEntry {
    /// Parse a 64-byte slice (panics if `buf.len() != ENTRY_SIZE`, same
    /// contract as the teacher's `index_fixed!`-based field accessors,
    /// which assert on slice length rather than returning `Option`).
    pub fn parse(buf: &[u8]) -> Self {
        assert_eq!(buf.len(), ENTRY_SIZE);
        let mut filename = [0u8; MAX_NAME_LEN];
        filename.copy_from_slice(&buf[2..44]);

        DirEntry {
            filename_sz: buf[0],
            attributes: buf[1],
            filename,
            first_cluster: u32::from_be_bytes(buf[44..48].try_into().unwrap()),
            file_size: u32::from_be_bytes(buf[48..52].try_into().unwrap()),
            creation_date: u16::from_be_bytes(buf[52..54].try_into().unwrap()),
            creation_time: u16::from_be_bytes(buf[54..56].try_into().unwrap()),
            access_date: u16::from_be_bytes(buf[56..58].try_into().unwrap()),
            access_time: u16::from_be_bytes(buf[58..60].try_into().unwrap()),
            modification_date: u16::from_be_bytes(buf[60..62].try_into().unwrap()),
            modification_time: u16::from_be_bytes(buf[62..64].try_into().unwrap()),
        }
    }

    /// Serialize back to a 64-byte buffer.
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0] = self.filename_sz;
        buf[1] = self.attributes;
        buf[2..44].copy_from_slice(&self.filename);
        buf[44..48].copy_from_slice(&self.first_cluster.to_be_bytes());
        buf[48..52].copy_from_slice(&self.file_size.to_be_bytes());
        buf[52..54].copy_from_slice(&self.creation_date.to_be_bytes());
        buf[54..56].copy_from_slice(&self.creation_time.to_be_bytes());
        buf[56..58].copy_from_slice(&self.access_date.to_be_bytes());
        buf[58..60].copy_from_slice(&self.access_time.to_be_bytes());
        buf[60..62].copy_from_slice(&self.modification_date.to_be_bytes());
        buf[62..64].copy_from_slice(&self.modification_time.to_be_bytes());
        buf
    }

    /// A freshly-zeroed entry, as written by `init_dir_cluster` before any
    /// name is set (all-`0xFF` filename_sz, everything else zero).
    pub fn blank_terminator() -> Self {
        DirEntry {
            filename_sz: FILENAME_SZ_TERMINATOR,
            attributes: 0,
            filename: [0u8; MAX_NAME_LEN],
            first_cluster: 0,
            file_size: 0,
            creation_date: 0,
            creation_time: 0,
            access_date: 0,
            access_time: 0,
            modification_date: 0,
            modification_time: 0,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.filename_sz == FILENAME_SZ_TERMINATOR
    }

    pub fn is_deleted(&self) -> bool {
        self.filename_sz == FILENAME_SZ_DELETED
    }

    /// Valid (in-use) entries have `filename_sz <= MAX_NAME_LEN`.
    pub fn is_valid(&self) -> bool {
        self.filename_sz as usize <= MAX_NAME_LEN
    }

    pub fn is_folder(&self) -> bool {
        self.attributes & ATTR_FOLDER != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes & ATTR_HIDDEN != 0
    }

    /// The significant bytes of `filename`, i.e. `filename[..filename_sz]`.
    pub fn name_bytes(&self) -> &[u8] {
        let len = (self.filename_sz as usize).min(MAX_NAME_LEN);
        &self.filename[..len]
    }
}

/// Locates a directory entry for later mutation: the cluster it lives in,
/// and its index (0..256) within that cluster. Re-resolved through the
/// cluster cache on every access rather than held as a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntryLoc {
    pub cluster_no: u32,
    pub entry_no: u16,
}

impl DirEntryLoc {
    pub fn byte_offset(&self) -> usize {
        self.entry_no as usize * ENTRY_SIZE
    }
}
