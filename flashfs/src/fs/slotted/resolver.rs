// SPDX-License-Identifier: MIT

use flashio::FlashIO;

use crate::core::errors::*;
use crate::core::meta::FsMeta;
use crate::core::record::FileRecord;
use crate::fs::slotted::meta::SlotMeta;

/// Reads a slot's payload into a caller buffer.
pub struct SlotResolver<'a, IO: FlashIO + ?Sized> {
    io: &'a mut IO,
    meta: &'a SlotMeta,
}

impl<'a, IO: FlashIO + ?Sized> SlotResolver<'a, IO> {
    pub fn new(io: &'a mut IO, meta: &'a SlotMeta) -> Self {
        Self { io, meta }
    }

    /// Payload range of `head`, or `FileCorrupt` when it leaves the payload
    /// area of the entry's own block.
    pub fn payload_range(&self, head: &FileRecord) -> FsReaderResult<(u32, u32)> {
        let block = self.meta.unit_of(head.address);
        let base = self.meta.block_address(block);
        let start = head.data_address;
        let end = start.checked_add(head.total_length);
        match end {
            Some(end)
                if start >= base + self.meta.data_start
                    && end <= base + self.meta.geometry.block_size =>
            {
                Ok((start, end))
            }
            _ => {
                log::warn!(
                    "slotted id={}: payload [{start:#x}; {}] outside block {block}",
                    head.file_id,
                    head.total_length
                );
                Err(FsReaderError::FileCorrupt)
            }
        }
    }

    pub fn read_into(&mut self, head: &FileRecord, out: &mut [u8]) -> FsReaderResult<usize> {
        let total = head.total_length as usize;
        if out.len() < total {
            return Err(FsReaderError::BufferTooSmall);
        }
        let (start, _) = self.payload_range(head)?;
        self.io.read_at(start, &mut out[..total])?;
        Ok(total)
    }
}
