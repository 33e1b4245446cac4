// SPDX-License-Identifier: MIT

use core::fmt;

use crate::core::errors::FsRecordResult;
use crate::core::utils::checksum_utils::Digest;
use crate::core::utils::name_utils::{FILENAME_LEN, encode_name, trim_name};

/// File identifier; `0` is reserved and never assigned.
pub type FileId = u32;

/// Tombstone byte of a live record (erased state).
pub const TOMBSTONE_LIVE: u8 = 0xFF;

/// Tombstone byte of a deleted record.
pub const TOMBSTONE_DELETED: u8 = 0x00;

/// NUL-padded filename as stored in a record.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileName {
    raw: [u8; FILENAME_LEN],
}

impl FileName {
    /// Validates and encodes `name`.
    pub fn new(name: &str) -> FsRecordResult<Self> {
        Ok(Self {
            raw: encode_name(name)?,
        })
    }

    /// Wraps a field read back from the medium, as-is.
    #[inline]
    pub fn from_raw(raw: [u8; FILENAME_LEN]) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn raw(&self) -> &[u8; FILENAME_LEN] {
        &self.raw
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        trim_name(&self.raw)
    }

    /// `None` when the stored bytes are not UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_bytes()).ok()
    }

    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes() == name.as_bytes()
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => {
                for &b in self.as_bytes() {
                    if b.is_ascii_graphic() || b == b' ' {
                        write!(f, "{}", b as char)?;
                    } else {
                        write!(f, "\\x{b:02x}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Decoded directory record, returned by value from every scan.
///
/// Layout-neutral: the chunked layout fills every field, the slotted layout
/// always reports one chunk at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    /// Scan position (block or slot index) the record was found at.
    pub position: u32,
    /// Medium address of the record itself.
    pub address: u32,
    pub file_id: FileId,
    pub chunk_count: u32,
    pub chunk_index: u32,
    /// Medium address of this record's payload.
    pub data_address: u32,
    pub name: FileName,
    /// Length of the whole file, not of this chunk.
    pub total_length: u32,
    pub hash: Digest,
    pub deleted: bool,
}

impl FileRecord {
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Chunk 0 carries the authoritative length and digest.
    #[inline]
    pub fn is_head(&self) -> bool {
        self.chunk_index == 0
    }

    /// Byte offset of this chunk's payload in the reassembled file.
    #[inline]
    pub fn chunk_offset(&self, payload_per_unit: u32) -> u64 {
        self.chunk_index as u64 * payload_per_unit as u64
    }

    /// Payload bytes held by this chunk: a full unit, or the final remainder.
    pub fn chunk_len(&self, payload_per_unit: u32) -> u32 {
        let offset = self.chunk_offset(payload_per_unit);
        let remaining = (self.total_length as u64).saturating_sub(offset);
        remaining.min(payload_per_unit as u64) as u32
    }
}

/// A file addressed either by the id returned from a write or by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRef<'a> {
    Id(FileId),
    Name(&'a str),
}

impl<'a> From<&'a str> for FileRef<'a> {
    fn from(name: &'a str) -> Self {
        FileRef::Name(name)
    }
}

impl From<FileId> for FileRef<'_> {
    fn from(id: FileId) -> Self {
        FileRef::Id(id)
    }
}

/// One step of a medium scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanSlot {
    pub position: u32,
    pub address: u32,
    /// `None` for a free block or slot.
    pub record: Option<FileRecord>,
}

/// Aggregates computed by the mount scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountStats {
    pub used_bytes: u32,
    /// Highest id seen; the next write uses `last_id + 1`.
    pub last_id: FileId,
    /// Valid records seen, deleted ones included.
    pub records: u32,
}

/// Everything a layout needs to lay one file down.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'d> {
    pub name: FileName,
    pub data: &'d [u8],
    pub file_id: FileId,
    pub hash: Digest,
    /// Read back every program and fail with `VerifyFailed` on mismatch.
    pub verify: bool,
}

impl WriteRequest<'_> {
    #[inline]
    pub fn total_length(&self) -> u32 {
        self.data.len() as u32
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::core::errors::FsRecordError;

    fn record(chunk_index: u32, total_length: u32) -> FileRecord {
        FileRecord {
            position: 0,
            address: 0,
            file_id: 1,
            chunk_count: 2,
            chunk_index,
            data_address: 256,
            name: FileName::new("log.bin").unwrap(),
            total_length,
            hash: [0; 16],
            deleted: false,
        }
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(record(0, 5000).chunk_len(3840), 3840);
        assert_eq!(record(1, 5000).chunk_len(3840), 1160);
        assert_eq!(record(0, 0).chunk_len(3840), 0);
        assert_eq!(record(3, 5000).chunk_len(3840), 0);
    }

    #[test]
    fn test_file_name() {
        let name = FileName::new("cfg").unwrap();
        assert!(name.matches("cfg"));
        assert!(!name.matches("cfg2"));
        assert_eq!(name.to_string(), "cfg");
        assert_eq!(FileName::new(""), Err(FsRecordError::InvalidName));

        let mut raw = [0u8; FILENAME_LEN];
        raw[..2].copy_from_slice(&[0xC3, 0x28]);
        assert_eq!(FileName::from_raw(raw).to_string(), "\\xc3(");
    }

    #[test]
    fn test_file_ref_from() {
        assert_eq!(FileRef::from("a"), FileRef::Name("a"));
        assert_eq!(FileRef::from(7u32), FileRef::Id(7));
    }
}
