// SPDX-License-Identifier: MIT

use flashio::{FlashIO, FlashIOExt, FlashIOStructExt};

use crate::core::errors::*;
use crate::core::record::WriteRequest;
use crate::fs::slotted::{allocator::*, meta::*, types::*};

/// Writes a file into one slot: payload first, entry last.
pub struct SlotInjector<'a, IO: FlashIO + ?Sized> {
    io: &'a mut IO,
    allocator: SlotAllocator<'a>,
    meta: &'a SlotMeta,
}

impl<'a, IO: FlashIO + ?Sized> SlotInjector<'a, IO> {
    pub fn new(io: &'a mut IO, meta: &'a SlotMeta, formatted_blocks: u32) -> Self {
        Self {
            io,
            allocator: SlotAllocator::new(meta, formatted_blocks),
            meta,
        }
    }

    pub fn allocator(&self) -> &SlotAllocator<'a> {
        &self.allocator
    }

    /// Erases a block and writes its directory header.
    fn format_block(&mut self, block: u32, verify: bool) -> FsWriterResult {
        let base = self.meta.block_address(block);
        self.io.erase_block(base)?;
        let header = SlotDirHeader::new(self.meta.slots_per_block, self.meta.data_start);
        self.io.write_struct(base, &header, verify)?;
        log::debug!("slotted: formatted block {block}");
        Ok(())
    }

    /// Lays `req` down and returns where it went.
    pub fn write_file(&mut self, req: &WriteRequest<'_>) -> FsWriterResult<SlotHandle> {
        let len = req.total_length();
        let handle = self.allocator.allocate(self.io, len)?;
        if handle.fresh {
            self.format_block(handle.block, req.verify)?;
        }

        if req.verify {
            self.io.write_verified(handle.data_address, req.data)?;
        } else {
            self.io.write_at(handle.data_address, req.data)?;
        }

        let entry = SlotEntry::new(req.file_id, handle.data_address, &req.name, len, req.hash);
        self.io.write_struct(handle.entry_address, &entry, req.verify)?;

        log::debug!(
            "slotted: id={} -> block {} slot {} ({len} bytes at {:#x})",
            req.file_id,
            handle.block,
            handle.slot,
            handle.data_address
        );
        Ok(handle)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::core::record::FileName;
    use crate::core::utils::checksum_utils::digest;
    use crate::fs::slotted::constant::*;
    use flashio::prelude::*;

    fn request<'d>(name: &str, data: &'d [u8], file_id: u32) -> WriteRequest<'d> {
        WriteRequest {
            name: FileName::new(name).unwrap(),
            data,
            file_id,
            hash: digest(data),
            verify: true,
        }
    }

    #[test]
    fn test_first_write_formats_block() {
        let meta = SlotMeta::with_defaults(8 * 1024);
        let mut buf = vec![0u8; 8 * 1024];
        {
            let mut io = MemFlash::new(&mut buf);
            let mut injector = SlotInjector::new(&mut io, &meta, 0);
            let handle = injector.write_file(&request("a", b"hello", 1)).unwrap();
            assert!(handle.fresh);
            assert_eq!(handle.data_address, 1024);
            assert_eq!(injector.allocator().used_units(), 1);
        }

        assert_eq!(&buf[0..4], &SLOT_HEADER_MAGIC.to_le_bytes());
        assert_eq!(&buf[128..132], &SLOT_ENTRY_MAGIC.to_le_bytes());
        assert_eq!(&buf[1024..1029], b"hello");
        // the erase covered the rest of the block
        assert_eq!(buf[1029], 0xFF);
        assert_eq!(buf[4096], 0);
    }

    #[test]
    fn test_payloads_are_page_aligned() {
        let meta = SlotMeta::with_defaults(8 * 1024);
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);

        let first = SlotInjector::new(&mut io, &meta, 0)
            .write_file(&request("a", &[1; 300], 1))
            .unwrap();
        let second = SlotInjector::new(&mut io, &meta, 1)
            .write_file(&request("b", &[2; 10], 2))
            .unwrap();
        assert_eq!(first.block, second.block);
        assert_eq!(second.slot, 1);
        assert_eq!(second.data_address, 1024 + 512);
        assert_eq!(second.prior_used, 1024 + 512);
    }
}
