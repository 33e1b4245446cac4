// SPDX-License-Identifier: MIT

pub use crate::core::allocator::*;

use flashio::{FlashIO, FlashIOExt};

use crate::core::cursor::ScanCursor;
use crate::fs::chain::{constant::*, meta::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHandle {
    pub block: u32,
    pub address: u32,
}

impl FsHandle for ChainHandle {
    fn data_address(&self) -> u32 {
        self.address + CHAIN_PAYLOAD_OFFSET
    }
}

/// First-fit block allocator.
///
/// A block is free when its first word is not the record magic. The cursor
/// only moves forward, so blocks handed out during one file write are never
/// handed out twice even before their record is programmed.
#[derive(Debug, Clone)]
pub struct ChainAllocator<'a> {
    meta: &'a ChainMeta,
    cursor: ScanCursor,
    used_blocks: u32,
}

impl<'a> ChainAllocator<'a> {
    pub fn new(meta: &'a ChainMeta, used_blocks: u32) -> Self {
        Self {
            meta,
            cursor: ScanCursor::new(),
            used_blocks,
        }
    }

    /// First block at or after the cursor whose record is not valid.
    pub fn find_free_block<IO: FlashIO + ?Sized>(
        &mut self,
        io: &mut IO,
    ) -> FsAllocatorResult<ChainHandle> {
        while self.cursor.position() < self.meta.block_count {
            let block = self.cursor.advance();
            let address = self.meta.block_address(block);
            if io.read_u32_at(address)? != CHAIN_MAGIC {
                return Ok(ChainHandle { block, address });
            }
        }
        log::debug!("chain allocator: no free block left");
        Err(FsAllocatorError::Full)
    }
}

impl<'a> FsAllocator<ChainHandle> for ChainAllocator<'a> {
    fn allocate<IO: FlashIO + ?Sized>(
        &mut self,
        io: &mut IO,
        len: u32,
    ) -> FsAllocatorResult<ChainHandle> {
        if len > self.meta.usable_per_block {
            return Err(FsAllocatorError::Other("chunk larger than a block"));
        }
        let handle = self.find_free_block(io)?;
        self.used_blocks += 1;
        Ok(handle)
    }

    fn used_units(&self) -> u32 {
        self.used_blocks
    }

    fn remaining_units(&self) -> u32 {
        self.meta.total_units().saturating_sub(self.used_blocks)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use flashio::prelude::*;

    #[test]
    fn test_skips_used_blocks() {
        let meta = ChainMeta::new(16 * 1024);
        let mut buf = vec![0xFFu8; 16 * 1024];
        buf[4096..4100].copy_from_slice(&CHAIN_MAGIC.to_le_bytes());
        let mut io = MemFlash::new(&mut buf);

        let mut allocator = ChainAllocator::new(&meta, 1);
        assert_eq!(allocator.allocate(&mut io, 10).unwrap().block, 0);
        assert_eq!(allocator.allocate(&mut io, 10).unwrap().block, 2);
        assert_eq!(allocator.used_units(), 3);
        assert_eq!(allocator.remaining_units(), 1);
    }

    #[test]
    fn test_full_never_runs_past_capacity() {
        let meta = ChainMeta::new(8 * 1024);
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);

        let mut allocator = ChainAllocator::new(&meta, 0);
        let first = allocator.allocate(&mut io, 0).unwrap();
        assert_eq!(first.data_address(), 256);
        allocator.allocate(&mut io, 0).unwrap();
        assert_eq!(allocator.allocate(&mut io, 0), Err(FsAllocatorError::Full));
    }
}
