// SPDX-License-Identifier: MIT

pub use crate::core::allocator::*;

use flashio::{FlashIO, FlashIOExt, FlashIOStructExt};

use crate::core::errors::FsCursorResult;
use crate::fs::slotted::{constant::*, meta::*, types::*};

/// Where one file goes: a free slot and a payload range in the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    pub block: u32,
    pub slot: u32,
    pub entry_address: u32,
    pub data_address: u32,
    /// Block must be erased and given a header before use.
    pub fresh: bool,
    /// Bytes the block accounted as used before this allocation.
    pub prior_used: u32,
}

impl FsHandle for SlotHandle {
    fn data_address(&self) -> u32 {
        self.data_address
    }
}

/// Directory state of one block, from a single pass over its slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSummary {
    /// Header present with this layout's directory shape.
    pub formatted: bool,
    /// First slot whose entry bytes are still erased.
    pub free_slot: Option<u32>,
    /// Page-aligned block-relative offset past every entry's payload and any
    /// stray programmed bytes.
    pub high_water: u32,
    pub live: u32,
    pub deleted: u32,
}

impl BlockSummary {
    /// Bytes this block counts as used: directory plus payload high-water mark.
    #[inline]
    pub fn used_bytes(&self) -> u32 {
        if self.formatted { self.high_water } else { 0 }
    }
}

/// Reads a block's header and every entry.
pub fn summarize_block<IO: FlashIO + ?Sized>(
    io: &mut IO,
    meta: &SlotMeta,
    block: u32,
) -> FsCursorResult<BlockSummary> {
    let base = meta.block_address(block);
    let header: SlotDirHeader = io.read_struct(base)?;
    if !header.matches(meta.slots_per_block, meta.data_start) {
        if header.is_valid() {
            log::warn!("slotted: block {block} has a foreign directory shape");
        }
        return Ok(BlockSummary::default());
    }

    let mut summary = BlockSummary {
        formatted: true,
        high_water: meta.data_start,
        ..Default::default()
    };
    for slot in 0..meta.slots_per_block {
        let address = meta.entry_address(block, slot);
        let entry: SlotEntry = io.read_struct(address)?;
        if entry.is_valid() {
            if entry.is_deleted() {
                summary.deleted += 1;
            } else {
                summary.live += 1;
            }
            let end = meta.align_offset(entry.data_end().saturating_sub(base));
            summary.high_water = summary.high_water.max(end);
        } else if summary.free_slot.is_none()
            && io.is_erased(address, SLOT_ENTRY_SIZE as usize)?
        {
            summary.free_slot = Some(slot);
        }
    }
    // payload programmed by a write torn before its entry
    summary.high_water = programmed_end(io, meta, base, summary.high_water)?;
    Ok(summary)
}

/// Page-aligned end of the last programmed byte in `[from, block end)`, or
/// `from` when that range is still erased.
fn programmed_end<IO: FlashIO + ?Sized>(
    io: &mut IO,
    meta: &SlotMeta,
    base: u32,
    from: u32,
) -> FsCursorResult<u32> {
    let block_size = meta.geometry.block_size;
    let mut buf = [0u8; 256];
    let mut end = from;
    let mut offset = from;
    while offset < block_size {
        let n = (block_size - offset).min(buf.len() as u32);
        let chunk = &mut buf[..n as usize];
        io.read_at(base + offset, chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b != 0xFF) {
            end = meta.align_offset(offset + i as u32 + 1);
        }
        offset += n;
    }
    Ok(end)
}

/// First-fit slot allocator.
///
/// Formatted blocks with a free slot and enough payload room win over
/// unformatted ones, so a new block is only claimed when the formatted ones
/// are exhausted.
#[derive(Debug, Clone)]
pub struct SlotAllocator<'a> {
    meta: &'a SlotMeta,
    formatted_blocks: u32,
}

impl<'a> SlotAllocator<'a> {
    pub fn new(meta: &'a SlotMeta, formatted_blocks: u32) -> Self {
        Self {
            meta,
            formatted_blocks,
        }
    }

    /// Finds room without writing anything.
    pub fn find_room<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        len: u32,
    ) -> FsAllocatorResult<SlotHandle> {
        if len > self.meta.payload_per_unit() {
            log::debug!("slotted allocator: {len} bytes never fit one block");
            return Err(FsAllocatorError::Full);
        }

        let mut unformatted = None;
        for block in 0..self.meta.block_count {
            let summary = summarize_block(io, self.meta, block)?;
            if !summary.formatted {
                unformatted.get_or_insert(block);
                continue;
            }
            let Some(slot) = summary.free_slot else {
                continue;
            };
            if summary.high_water + len > self.meta.geometry.block_size {
                continue;
            }
            return Ok(SlotHandle {
                block,
                slot,
                entry_address: self.meta.entry_address(block, slot),
                data_address: self.meta.block_address(block) + summary.high_water,
                fresh: false,
                prior_used: summary.high_water,
            });
        }

        match unformatted {
            Some(block) => Ok(SlotHandle {
                block,
                slot: 0,
                entry_address: self.meta.entry_address(block, 0),
                data_address: self.meta.block_address(block) + self.meta.data_start,
                fresh: true,
                prior_used: 0,
            }),
            None => {
                log::debug!("slotted allocator: no block can hold {len} bytes");
                Err(FsAllocatorError::Full)
            }
        }
    }
}

impl<'a> FsAllocator<SlotHandle> for SlotAllocator<'a> {
    fn allocate<IO: FlashIO + ?Sized>(
        &mut self,
        io: &mut IO,
        len: u32,
    ) -> FsAllocatorResult<SlotHandle> {
        let handle = self.find_room(io, len)?;
        if handle.fresh {
            self.formatted_blocks += 1;
        }
        Ok(handle)
    }

    fn used_units(&self) -> u32 {
        self.formatted_blocks
    }

    fn remaining_units(&self) -> u32 {
        self.meta.total_units().saturating_sub(self.formatted_blocks)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::core::record::FileName;
    use flashio::prelude::*;

    fn format_block(io: &mut MemFlash<'_>, meta: &SlotMeta, block: u32) {
        let header = SlotDirHeader::new(meta.slots_per_block, meta.data_start);
        io.write_struct(meta.block_address(block), &header, true).unwrap();
    }

    #[test]
    fn test_prefers_formatted_block() {
        let meta = SlotMeta::with_defaults(16 * 1024);
        let mut buf = vec![0xFFu8; 16 * 1024];
        let mut io = MemFlash::new(&mut buf);
        format_block(&mut io, &meta, 2);

        let mut allocator = SlotAllocator::new(&meta, 1);
        let handle = allocator.allocate(&mut io, 100).unwrap();
        assert_eq!(handle.block, 2);
        assert!(!handle.fresh);
        assert_eq!(handle.data_address, 2 * 4096 + 1024);
        assert_eq!(allocator.used_units(), 1);
    }

    #[test]
    fn test_falls_back_to_unformatted() {
        let meta = SlotMeta::with_defaults(8 * 1024);
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);
        format_block(&mut io, &meta, 0);

        let name = FileName::new("a").unwrap();
        let entry = SlotEntry::new(1, 1024, &name, 3000, [0; 16]);
        io.write_struct(meta.entry_address(0, 0), &entry, true).unwrap();

        let summary = summarize_block(&mut io, &meta, 0).unwrap();
        assert_eq!(summary.free_slot, Some(1));
        assert_eq!(summary.high_water, 4096);
        assert_eq!(summary.live, 1);

        let mut allocator = SlotAllocator::new(&meta, 1);
        let handle = allocator.allocate(&mut io, 10).unwrap();
        assert_eq!((handle.block, handle.slot, handle.fresh), (1, 0, true));
        assert_eq!(allocator.remaining_units(), 0);
    }

    #[test]
    fn test_full_when_nothing_fits() {
        let meta = SlotMeta::with_defaults(4096);
        let mut buf = vec![0xFFu8; 4096];
        let mut io = MemFlash::new(&mut buf);

        let mut allocator = SlotAllocator::new(&meta, 0);
        assert_eq!(allocator.allocate(&mut io, 3073), Err(FsAllocatorError::Full));
        assert!(allocator.allocate(&mut io, 3072).is_ok());
    }

    #[test]
    fn test_places_after_stray_payload() {
        let meta = SlotMeta::with_defaults(8 * 1024);
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);
        format_block(&mut io, &meta, 0);
        io.write_at(1024, &[0u8; 16]).unwrap();
        io.write_at(1536 + 7, &[0x5A]).unwrap();

        let summary = summarize_block(&mut io, &meta, 0).unwrap();
        assert_eq!((summary.live, summary.deleted), (0, 0));
        assert_eq!(summary.high_water, 1792);
        assert_eq!(summary.used_bytes(), 1792);

        let allocator = SlotAllocator::new(&meta, 1);
        let handle = allocator.find_room(&mut io, 16).unwrap();
        assert_eq!((handle.block, handle.data_address), (0, 1792));
        assert_eq!(handle.prior_used, 1792);
    }
}
