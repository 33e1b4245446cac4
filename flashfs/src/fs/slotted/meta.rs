// SPDX-License-Identifier: MIT

pub use crate::core::meta::*;

use flashio::FlashGeometry;

use crate::fs::slotted::constant::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMeta {
    pub geometry: FlashGeometry,
    pub block_count: u32,
    pub slots_per_block: u32,
    /// Block-relative payload start: header and entries rounded up to a page.
    pub data_start: u32,
}

impl SlotMeta {
    /// Region of `region_len` bytes on a medium with `geometry`'s page and
    /// block sizes. A directory that does not leave payload room yields zero
    /// blocks.
    pub fn new(region_len: u32, geometry: FlashGeometry, slots_per_block: u32) -> Self {
        let directory = SLOT_HEADER_SIZE + slots_per_block.saturating_mul(SLOT_ENTRY_SIZE);
        let data_start = directory.div_ceil(geometry.page_size) * geometry.page_size;
        let block_count = if slots_per_block == 0 || data_start >= geometry.block_size {
            0
        } else {
            region_len / geometry.block_size
        };
        Self {
            geometry: FlashGeometry::new(geometry.page_size, geometry.block_size, region_len),
            block_count,
            slots_per_block,
            data_start,
        }
    }

    /// NOR geometry and the default directory size.
    pub fn with_defaults(region_len: u32) -> Self {
        Self::new(
            region_len,
            FlashGeometry::nor(region_len),
            DEFAULT_SLOTS_PER_BLOCK,
        )
    }

    #[inline]
    pub fn block_address(&self, block: u32) -> u32 {
        block * self.geometry.block_size
    }

    #[inline]
    pub fn entry_address(&self, block: u32, slot: u32) -> u32 {
        self.block_address(block) + SLOT_HEADER_SIZE + slot * SLOT_ENTRY_SIZE
    }

    /// `(block, slot)` of a scan position.
    #[inline]
    pub fn split(&self, position: u32) -> (u32, u32) {
        (
            position / self.slots_per_block,
            position % self.slots_per_block,
        )
    }

    /// Rounds a block-relative offset up to the next page, capped at the block end.
    #[inline]
    pub fn align_offset(&self, offset: u32) -> u32 {
        let page = self.geometry.page_size;
        offset
            .div_ceil(page)
            .saturating_mul(page)
            .min(self.geometry.block_size)
    }
}

impl FsMeta for SlotMeta {
    fn unit_size(&self) -> u32 {
        self.geometry.block_size
    }

    fn unit_offset(&self, unit: u32) -> u32 {
        self.block_address(unit)
    }

    fn total_units(&self) -> u32 {
        self.block_count
    }

    fn payload_per_unit(&self) -> u32 {
        self.geometry.block_size.saturating_sub(self.data_start)
    }

    fn positions(&self) -> u32 {
        self.block_count * self.slots_per_block
    }
}
