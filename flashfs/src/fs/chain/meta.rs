// SPDX-License-Identifier: MIT

pub use crate::core::meta::*;

use flashio::{FlashGeometry, FlashIO};

use crate::core::errors::{FsError, FsRecordError, FsResult};
use crate::fs::chain::constant::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainMeta {
    pub geometry: FlashGeometry,
    pub block_count: u32,
    /// Payload bytes per block, after the record.
    pub usable_per_block: u32,
}

impl ChainMeta {
    /// Nominal NOR geometry over `capacity` bytes.
    pub fn new(capacity: u32) -> Self {
        Self::new_custom(FlashGeometry::nor(capacity))
    }

    /// Any geometry whose erase block is larger than a record. Smaller blocks
    /// leave no room for payload and yield a layout with zero blocks.
    pub fn new_custom(geometry: FlashGeometry) -> Self {
        let usable_per_block = geometry.block_size.saturating_sub(CHAIN_PAYLOAD_OFFSET);
        let block_count = if usable_per_block == 0 {
            0
        } else {
            geometry.block_count()
        };
        Self {
            geometry,
            block_count,
            usable_per_block,
        }
    }

    /// Takes page and block size from the medium and capacity from the part's
    /// identification query.
    pub fn probe<IO: FlashIO + ?Sized>(io: &mut IO) -> FsResult<Self> {
        let id = io.identify()?;
        let geometry = io.geometry();
        let capacity = id
            .capacity_bytes()
            .ok_or(FsError::Record(FsRecordError::Invalid("unsupported capacity code")))?;
        let capacity = if capacity > geometry.capacity {
            log::warn!(
                "chip reports {capacity} bytes, medium exposes {}; using the smaller",
                geometry.capacity
            );
            geometry.capacity
        } else {
            capacity
        };
        log::debug!(
            "chain layout: capacity={capacity} block={} page={}",
            geometry.block_size,
            geometry.page_size
        );
        Ok(Self::new_custom(FlashGeometry::new(
            geometry.page_size,
            geometry.block_size,
            capacity,
        )))
    }

    #[inline]
    pub fn block_address(&self, block: u32) -> u32 {
        block * self.geometry.block_size
    }

    /// Blocks needed for `len` bytes; an empty file still takes one block.
    pub fn blocks_for(&self, len: u32) -> u32 {
        if self.usable_per_block == 0 {
            return u32::MAX;
        }
        len.div_ceil(self.usable_per_block).max(1)
    }
}

impl FsMeta for ChainMeta {
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
        self.usable_per_block
    }

    fn positions(&self) -> u32 {
        self.block_count
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use flashio::prelude::*;

    #[test]
    fn test_nominal_geometry() {
        let meta = ChainMeta::new(64 * 1024);
        assert_eq!(meta.block_count, 16);
        assert_eq!(meta.usable_per_block, CHAIN_USABLE_PER_BLOCK);
        assert_eq!(meta.size_bytes(), 64 * 1024);
    }

    #[test]
    fn test_blocks_for() {
        let meta = ChainMeta::new(64 * 1024);
        assert_eq!(meta.blocks_for(0), 1);
        assert_eq!(meta.blocks_for(1), 1);
        assert_eq!(meta.blocks_for(3840), 1);
        assert_eq!(meta.blocks_for(3841), 2);
        assert_eq!(meta.blocks_for(5000), 2);
    }

    #[test]
    fn test_probe_uses_identify() {
        let mut buf = vec![0xFFu8; 128 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let meta = ChainMeta::probe(&mut io).unwrap();
        assert_eq!(meta.geometry.capacity, 128 * 1024);
        assert_eq!(meta.block_count, 32);
    }

    #[test]
    fn test_tiny_blocks_have_no_room() {
        let meta = ChainMeta::new_custom(FlashGeometry::new(256, 256, 4096));
        assert_eq!(meta.block_count, 0);
        assert_eq!(meta.blocks_for(1), u32::MAX);
    }
}
