// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::core::record::*;
use crate::core::utils::checksum_utils::Digest;
use crate::core::utils::name_utils::FILENAME_LEN;
use crate::fs::chain::constant::*;

/// Per-block record at offset 0 of every block of a chain.
///
/// Every chunk repeats the full file metadata; readers only trust chunk 0.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ChainRecord {
    pub magic: u32,
    pub file_id: u32,
    pub chunk_count: u32,
    pub chunk_index: u32,
    pub block_address: u32,
    pub filename: [u8; FILENAME_LEN],
    pub total_length: u32,
    pub hash: [u8; 16],
    pub deleted: u8,
    pub padding: [u8; CHAIN_RECORD_PADDING],
}

const _: () = assert!(core::mem::size_of::<ChainRecord>() == CHAIN_RECORD_SIZE);

impl ChainRecord {
    pub fn new(
        file_id: FileId,
        chunk_count: u32,
        chunk_index: u32,
        block_address: u32,
        name: &FileName,
        total_length: u32,
        hash: Digest,
    ) -> Self {
        Self {
            magic: CHAIN_MAGIC,
            file_id,
            chunk_count,
            chunk_index,
            block_address,
            filename: *name.raw(),
            total_length,
            hash,
            deleted: TOMBSTONE_LIVE,
            padding: [0xFF; CHAIN_RECORD_PADDING],
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        let magic = self.magic;
        magic == CHAIN_MAGIC
    }

    /// Decodes into the layout-neutral record. `position` is the block index.
    pub fn to_record(&self, position: u32, address: u32) -> FileRecord {
        FileRecord {
            position,
            address,
            file_id: self.file_id,
            chunk_count: self.chunk_count,
            chunk_index: self.chunk_index,
            data_address: address + CHAIN_PAYLOAD_OFFSET,
            name: FileName::from_raw(self.filename),
            total_length: self.total_length,
            hash: self.hash,
            deleted: self.deleted == TOMBSTONE_DELETED,
        }
    }
}
