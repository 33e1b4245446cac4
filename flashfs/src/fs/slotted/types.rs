// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::core::record::*;
use crate::core::utils::checksum_utils::Digest;
use crate::core::utils::name_utils::FILENAME_LEN;
use crate::fs::slotted::constant::*;

/// Block header, at offset 0 of every formatted block.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct SlotDirHeader {
    pub magic: u32,
    pub slot_count: u32,
    /// Block-relative offset of the payload area.
    pub data_start: u32,
    pub padding: [u8; SLOT_HEADER_PADDING],
}

const _: () = assert!(core::mem::size_of::<SlotDirHeader>() == SLOT_HEADER_SIZE as usize);

impl SlotDirHeader {
    pub fn new(slot_count: u32, data_start: u32) -> Self {
        Self {
            magic: SLOT_HEADER_MAGIC,
            slot_count,
            data_start,
            padding: [0xFF; SLOT_HEADER_PADDING],
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        let magic = self.magic;
        magic == SLOT_HEADER_MAGIC
    }

    /// Valid and formatted with the given directory shape.
    pub fn matches(&self, slot_count: u32, data_start: u32) -> bool {
        let shape = (self.slot_count, self.data_start);
        self.is_valid() && shape == (slot_count, data_start)
    }
}

/// Directory entry: one file, one contiguous payload in the same block.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct SlotEntry {
    pub magic: u32,
    pub file_id: u32,
    pub data_address: u32,
    pub total_length: u32,
    pub filename: [u8; FILENAME_LEN],
    pub hash: [u8; 16],
    pub deleted: u8,
    pub padding: [u8; SLOT_ENTRY_PADDING],
}

const _: () = assert!(core::mem::size_of::<SlotEntry>() == SLOT_ENTRY_SIZE as usize);

/// Entry-relative offset of the tombstone byte.
pub const SLOT_TOMBSTONE_OFFSET: u32 = core::mem::offset_of!(SlotEntry, deleted) as u32;

impl SlotEntry {
    pub fn new(
        file_id: FileId,
        data_address: u32,
        name: &FileName,
        total_length: u32,
        hash: Digest,
    ) -> Self {
        Self {
            magic: SLOT_ENTRY_MAGIC,
            file_id,
            data_address,
            total_length,
            filename: *name.raw(),
            hash,
            deleted: TOMBSTONE_LIVE,
            padding: [0xFF; SLOT_ENTRY_PADDING],
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        let magic = self.magic;
        magic == SLOT_ENTRY_MAGIC
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted == TOMBSTONE_DELETED
    }

    /// Payload end, saturating on garbage lengths.
    #[inline]
    pub fn data_end(&self) -> u32 {
        let (address, len) = (self.data_address, self.total_length);
        address.saturating_add(len)
    }

    /// Decodes into the layout-neutral record; always a single chunk.
    pub fn to_record(&self, position: u32, address: u32) -> FileRecord {
        FileRecord {
            position,
            address,
            file_id: self.file_id,
            chunk_count: 1,
            chunk_index: 0,
            data_address: self.data_address,
            name: FileName::from_raw(self.filename),
            total_length: self.total_length,
            hash: self.hash,
            deleted: self.is_deleted(),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let name = FileName::new("settings").unwrap();
        let entry = SlotEntry::new(5, 0x1400, &name, 42, [0x11; 16]);
        let bytes = entry.as_bytes();

        assert_eq!(bytes.len(), 128);
        assert_eq!(&bytes[0..4], &0x7a3b_4411u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &5u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0x1400u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &42u32.to_le_bytes());
        assert_eq!(&bytes[16..24], b"settings");
        assert_eq!(&bytes[96..112], &[0x11; 16]);
        assert_eq!(SLOT_TOMBSTONE_OFFSET, 112);
        assert_eq!(bytes[112], TOMBSTONE_LIVE);
    }

    #[test]
    fn test_header_matches_shape() {
        let header = SlotDirHeader::new(7, 1024);
        assert_eq!(&header.as_bytes()[0..4], &0x93f6_1b39u32.to_le_bytes());
        assert!(header.matches(7, 1024));
        assert!(!header.matches(6, 1024));

        let Ok(erased) = SlotDirHeader::read_from_bytes(&[0xFFu8; 128][..]) else {
            panic!("header size mismatch");
        };
        assert!(!erased.is_valid());
    }

    #[test]
    fn test_to_record_is_single_chunk() {
        let name = FileName::new("a").unwrap();
        let mut entry = SlotEntry::new(9, 0x2400, &name, 3, [0; 16]);
        let rec = entry.to_record(8, 0x2080);
        assert_eq!((rec.chunk_count, rec.chunk_index), (1, 0));
        assert_eq!(rec.data_address, 0x2400);
        assert!(rec.is_live());

        entry.deleted = TOMBSTONE_DELETED;
        assert!(!entry.to_record(8, 0x2080).is_live());
    }
}
