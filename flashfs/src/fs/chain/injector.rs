// SPDX-License-Identifier: MIT

use flashio::{FlashIO, FlashIOExt, FlashIOStructExt};

use crate::core::errors::*;
use crate::core::record::WriteRequest;
use crate::fs::chain::{allocator::*, meta::*, types::ChainRecord};

/// Lays a file down as a chain of whole blocks.
///
/// Per chunk: find a free block, erase it, program the payload, then program
/// the record. A chunk whose record is missing reads back as a free block, so
/// an interrupted write never leaves a half-valid block behind.
pub struct ChainInjector<'a, IO: FlashIO + ?Sized> {
    io: &'a mut IO,
    allocator: ChainAllocator<'a>,
    meta: &'a ChainMeta,
}

impl<'a, IO: FlashIO + ?Sized> ChainInjector<'a, IO> {
    pub fn new(io: &'a mut IO, meta: &'a ChainMeta, used_blocks: u32) -> Self {
        Self {
            io,
            allocator: ChainAllocator::new(meta, used_blocks),
            meta,
        }
    }

    pub fn allocator(&self) -> &ChainAllocator<'a> {
        &self.allocator
    }

    fn program(&mut self, address: u32, data: &[u8], verify: bool) -> FsWriterResult {
        if verify {
            self.io.write_verified(address, data)?;
        } else {
            self.io.write_at(address, data)?;
        }
        Ok(())
    }

    /// Writes every chunk of `req`; returns the blocks consumed.
    ///
    /// Stops at the first failure without rolling back chunks already written.
    pub fn write_file(&mut self, req: &WriteRequest<'_>) -> FsWriterResult<u32> {
        let total_length = req.total_length();
        let chunk_count = self.meta.blocks_for(total_length);
        let usable = self.meta.usable_per_block as usize;

        for chunk_index in 0..chunk_count {
            let start = (chunk_index as usize * usable).min(req.data.len());
            let end = (start + usable).min(req.data.len());
            let payload = &req.data[start..end];

            let handle = self.allocator.allocate(self.io, payload.len() as u32)?;
            self.io.erase_block(handle.address)?;
            self.program(handle.data_address(), payload, req.verify)?;

            let record = ChainRecord::new(
                req.file_id,
                chunk_count,
                chunk_index,
                handle.address,
                &req.name,
                total_length,
                req.hash,
            );
            self.io.write_struct(handle.address, &record, req.verify)?;

            log::debug!(
                "chain: id={} chunk {}/{} -> block {} ({} bytes)",
                req.file_id,
                chunk_index + 1,
                chunk_count,
                handle.block,
                payload.len()
            );
        }
        Ok(chunk_count)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::core::record::FileName;
    use crate::core::utils::checksum_utils::digest;
    use crate::fs::chain::constant::*;
    use flashio::prelude::*;

    #[test]
    fn test_chunks_land_in_free_blocks() {
        let meta = ChainMeta::new(16 * 1024);
        let mut buf = vec![0u8; 16 * 1024];
        {
            let mut io = MemFlash::new(&mut buf);
            let data: Vec<u8> = (0..5000u32).map(|i| i as u8).collect();
            let req = WriteRequest {
                name: FileName::new("log.bin").unwrap(),
                data: &data,
                file_id: 1,
                hash: digest(&data),
                verify: true,
            };
            let mut injector = ChainInjector::new(&mut io, &meta, 0);
            assert_eq!(injector.write_file(&req).unwrap(), 2);
            assert_eq!(injector.allocator().used_units(), 2);
        }

        // blocks start programmed to zero: both were erased before use
        assert_eq!(&buf[0..4], &CHAIN_MAGIC.to_le_bytes());
        assert_eq!(&buf[4096..4100], &CHAIN_MAGIC.to_le_bytes());
        assert_eq!(buf[256], 0);
        assert_eq!(buf[4096 + 256 + 1159], (4999u32) as u8);
        assert_eq!(buf[4096 + 256 + 1160], 0xFF);
        assert_eq!(&buf[8192..8196], &[0, 0, 0, 0]);
    }
}
