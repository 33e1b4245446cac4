// SPDX-License-Identifier: MIT

use flashio::{FlashIO, FlashIOStructExt};

use crate::core::cursor::{ScanCursor, count_records};
use crate::core::errors::*;
use crate::core::filesystem::FlashFs;
use crate::core::layout::FsLayout;
use crate::core::record::*;
use crate::fs::chain::{
    injector::ChainInjector, meta::*, resolver::ChainResolver, types::ChainRecord,
};

/// Chunked-chain layout: a file is a chain of whole erase blocks, each one
/// starting with a full copy of the file record.
#[derive(Debug, Clone)]
pub struct ChainLayout {
    pub meta: ChainMeta,
    used_blocks: u32,
}

impl ChainLayout {
    pub fn new(meta: ChainMeta) -> Self {
        Self {
            meta,
            used_blocks: 0,
        }
    }

    /// Layout over the whole part, sized from its identification query.
    pub fn probe<IO: FlashIO + ?Sized>(io: &mut IO) -> FsResult<Self> {
        Ok(Self::new(ChainMeta::probe(io)?))
    }

    #[inline]
    pub fn used_blocks(&self) -> u32 {
        self.used_blocks
    }

    #[inline]
    pub fn free_blocks(&self) -> u32 {
        self.meta.block_count.saturating_sub(self.used_blocks)
    }

    fn read_slot<IO: FlashIO + ?Sized>(&self, io: &mut IO, block: u32) -> FsCursorResult<ScanSlot> {
        let address = self.meta.block_address(block);
        let raw: ChainRecord = io.read_struct(address)?;
        let record = if raw.is_valid() {
            Some(raw.to_record(block, address))
        } else {
            None
        };
        Ok(ScanSlot {
            position: block,
            address,
            record,
        })
    }
}

impl FsLayout for ChainLayout {
    type Meta = ChainMeta;

    fn meta(&self) -> &ChainMeta {
        &self.meta
    }

    fn next_record<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        cursor: &mut ScanCursor,
    ) -> Option<FsCursorResult<ScanSlot>> {
        if cursor.position() >= self.meta.block_count {
            return None;
        }
        let block = cursor.advance();
        Some(self.read_slot(io, block))
    }

    fn mount<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsCursorResult<MountStats> {
        let mut stats = MountStats::default();
        ScanCursor::new().for_each_record(io, &*self, |rec| {
            stats.records += 1;
            stats.last_id = stats.last_id.max(rec.file_id);
            Ok(())
        })?;
        self.used_blocks = stats.records;
        stats.used_bytes = self.used_bytes();
        log::debug!(
            "chain mount: {} of {} blocks used, last id {}",
            self.used_blocks,
            self.meta.block_count,
            stats.last_id
        );
        Ok(stats)
    }

    fn used_bytes(&self) -> u32 {
        self.used_blocks * self.meta.geometry.block_size
    }

    fn reserve<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        len: u32,
        replacing: Option<FileId>,
    ) -> FsAllocatorResult {
        let required = self.meta.blocks_for(len);
        let released = match replacing {
            Some(id) => count_records(io, self, id)?,
            None => 0,
        };
        let available = self.free_blocks().saturating_add(released);
        if required > available {
            log::debug!("chain reserve: need {required} blocks, {available} available");
            return Err(FsAllocatorError::Full);
        }
        Ok(())
    }

    fn write_file<IO: FlashIO + ?Sized>(
        &mut self,
        io: &mut IO,
        req: &WriteRequest<'_>,
    ) -> FsWriterResult {
        let result = ChainInjector::new(&mut *io, &self.meta, self.used_blocks).write_file(req);
        match result {
            Ok(blocks) => {
                self.used_blocks += blocks;
                Ok(())
            }
            Err(e) => {
                log::error!("chain write of id={} aborted: {e}", req.file_id);
                // chunks already written stay on the medium; recount them
                if let Err(rescan) = self.mount(io) {
                    log::error!("chain rescan failed: {rescan}");
                }
                Err(e)
            }
        }
    }

    fn read_file<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        head: &FileRecord,
        out: &mut [u8],
    ) -> FsReaderResult<usize> {
        ChainResolver::new(io, self).read_into(head, out)
    }

    fn remove<IO: FlashIO + ?Sized>(&mut self, io: &mut IO, id: FileId) -> FsWriterResult<u32> {
        let mut erased = 0u32;
        let mut cursor = ScanCursor::new();
        while let Some(slot) = cursor.next_with(io, &*self) {
            if let Some(rec) = slot?.record
                && rec.file_id == id
            {
                io.erase_block(rec.address)?;
                erased += 1;
            }
        }
        self.used_blocks = self.used_blocks.saturating_sub(erased);
        if erased > 0 {
            log::debug!("chain: removed id={id} ({erased} blocks)");
        }
        Ok(erased)
    }

    fn format<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsWriterResult {
        io.erase_all()?;
        self.used_blocks = 0;
        Ok(())
    }

    fn validate_record(&self, rec: &FileRecord) -> Result<(), &'static str> {
        if rec.file_id == 0 {
            return Err("reserved file id 0");
        }
        if rec.chunk_count == 0 || rec.chunk_index >= rec.chunk_count {
            return Err("chunk index outside chunk count");
        }
        if rec.chunk_count != self.meta.blocks_for(rec.total_length) {
            return Err("chunk count does not match total length");
        }
        Ok(())
    }

    fn identifier(&self) -> &'static str {
        "chain"
    }
}

impl<'a, IO: FlashIO + ?Sized> FlashFs<'a, IO, ChainLayout> {
    /// Mounts the chunked layout over a whole chip sized by `identify()`.
    pub fn mount_chip(io: &'a mut IO) -> FsResult<Self> {
        let layout = ChainLayout::probe(&mut *io)?;
        Self::mount(io, layout)
    }
}
