// SPDX-License-Identifier: MIT

use flashio::{FlashIO, FlashIOExt, FlashIOStructExt};

use crate::core::cursor::ScanCursor;
use crate::core::errors::*;
use crate::core::filesystem::FlashFs;
use crate::core::layout::FsLayout;
use crate::core::record::*;
use crate::fs::slotted::{
    allocator::*, constant::*, injector::SlotInjector, meta::*, resolver::SlotResolver, types::*,
};

/// Slotted-directory layout: every block carries a header, a fixed table of
/// entries and a payload area; one file lives in one block.
#[derive(Debug, Clone)]
pub struct SlotLayout {
    pub meta: SlotMeta,
    used_bytes: u32,
    formatted_blocks: u32,
}

impl SlotLayout {
    pub fn new(meta: SlotMeta) -> Self {
        Self {
            meta,
            used_bytes: 0,
            formatted_blocks: 0,
        }
    }

    /// Region of `region_len` bytes from the medium's offset 0, with the
    /// default directory size.
    pub fn for_region<IO: FlashIO + ?Sized>(io: &IO, region_len: u32) -> Self {
        let geometry = io.geometry();
        let region_len = if region_len > geometry.capacity {
            log::warn!(
                "slotted region of {region_len} bytes exceeds the medium ({}); truncated",
                geometry.capacity
            );
            geometry.capacity
        } else {
            region_len
        };
        Self::new(SlotMeta::new(region_len, geometry, DEFAULT_SLOTS_PER_BLOCK))
    }

    #[inline]
    pub fn formatted_blocks(&self) -> u32 {
        self.formatted_blocks
    }

    fn read_slot<IO: FlashIO + ?Sized>(&self, io: &mut IO, position: u32) -> FsCursorResult<ScanSlot> {
        let (block, slot) = self.meta.split(position);
        let address = self.meta.entry_address(block, slot);
        let header: SlotDirHeader = io.read_struct(self.meta.block_address(block))?;
        let record = if header.matches(self.meta.slots_per_block, self.meta.data_start) {
            let entry: SlotEntry = io.read_struct(address)?;
            entry.is_valid().then(|| entry.to_record(position, address))
        } else {
            None
        };
        Ok(ScanSlot {
            position,
            address,
            record,
        })
    }

    /// Recomputes the accounting from every block summary.
    fn rescan<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsCursorResult {
        let mut used = 0;
        let mut formatted = 0;
        for block in 0..self.meta.block_count {
            let summary = summarize_block(io, &self.meta, block)?;
            used += summary.used_bytes();
            formatted += summary.formatted as u32;
        }
        self.used_bytes = used;
        self.formatted_blocks = formatted;
        Ok(())
    }
}

impl FsLayout for SlotLayout {
    type Meta = SlotMeta;

    fn meta(&self) -> &SlotMeta {
        &self.meta
    }

    fn next_record<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        cursor: &mut ScanCursor,
    ) -> Option<FsCursorResult<ScanSlot>> {
        if cursor.position() >= self.meta.positions() {
            return None;
        }
        let position = cursor.advance();
        Some(self.read_slot(io, position))
    }

    fn mount<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsCursorResult<MountStats> {
        self.rescan(io)?;

        let mut stats = MountStats::default();
        // tombstoned entries still hold their id
        ScanCursor::new().for_each_record(io, &*self, |rec| {
            stats.records += 1;
            stats.last_id = stats.last_id.max(rec.file_id);
            Ok(())
        })?;
        stats.used_bytes = self.used_bytes;
        log::debug!(
            "slotted mount: {} of {} blocks formatted, {} bytes used, last id {}",
            self.formatted_blocks,
            self.meta.block_count,
            self.used_bytes,
            stats.last_id
        );
        Ok(stats)
    }

    fn used_bytes(&self) -> u32 {
        self.used_bytes
    }

    fn reserve<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        len: u32,
        _replacing: Option<FileId>,
    ) -> FsAllocatorResult {
        // a tombstone gives nothing back until reclaim, so the old generation never counts
        SlotAllocator::new(&self.meta, self.formatted_blocks)
            .find_room(io, len)
            .map(|_| ())
    }

    fn write_file<IO: FlashIO + ?Sized>(
        &mut self,
        io: &mut IO,
        req: &WriteRequest<'_>,
    ) -> FsWriterResult {
        let result = SlotInjector::new(&mut *io, &self.meta, self.formatted_blocks).write_file(req);
        match result {
            Ok(handle) => {
                let base = self.meta.block_address(handle.block);
                let used = self
                    .meta
                    .align_offset(handle.data_address - base + req.total_length());
                self.used_bytes = self.used_bytes.saturating_sub(handle.prior_used) + used;
                self.formatted_blocks += handle.fresh as u32;
                Ok(())
            }
            Err(e) => {
                log::error!("slotted write of id={} aborted: {e}", req.file_id);
                if let Err(rescan) = self.rescan(io) {
                    log::error!("slotted rescan failed: {rescan}");
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
        SlotResolver::new(io, &self.meta).read_into(head, out)
    }

    /// Tombstones every live entry of `id`; the block's space stays used.
    fn remove<IO: FlashIO + ?Sized>(&mut self, io: &mut IO, id: FileId) -> FsWriterResult<u32> {
        let mut unlinked = 0u32;
        let mut cursor = ScanCursor::new();
        while let Some(slot) = cursor.next_with(io, &*self) {
            if let Some(rec) = slot?.record
                && rec.is_live()
                && rec.file_id == id
            {
                io.write_at(rec.address + SLOT_TOMBSTONE_OFFSET, &[TOMBSTONE_DELETED])?;
                unlinked += 1;
            }
        }
        if unlinked > 0 {
            log::debug!("slotted: unlinked id={id} ({unlinked} entries)");
        }
        Ok(unlinked)
    }

    /// Erases the region block by block, leaving the rest of the chip alone.
    fn format<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsWriterResult {
        for block in 0..self.meta.block_count {
            io.erase_block(self.meta.block_address(block))?;
        }
        self.used_bytes = 0;
        self.formatted_blocks = 0;
        Ok(())
    }

    /// Erases formatted blocks with no live entry that hold tombstones or
    /// payload left by an aborted write.
    fn reclaim<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsWriterResult<u32> {
        let mut erased = 0;
        for block in 0..self.meta.block_count {
            let summary = summarize_block(io, &self.meta, block)?;
            let dirty = summary.deleted > 0 || summary.high_water > self.meta.data_start;
            if !summary.formatted || summary.live > 0 || !dirty {
                continue;
            }
            io.erase_block(self.meta.block_address(block))?;
            self.used_bytes = self.used_bytes.saturating_sub(summary.used_bytes());
            self.formatted_blocks = self.formatted_blocks.saturating_sub(1);
            erased += 1;
            log::debug!(
                "slotted: reclaimed block {block} ({} deleted entries, high water {})",
                summary.deleted,
                summary.high_water
            );
        }
        Ok(erased)
    }

    fn validate_record(&self, rec: &FileRecord) -> Result<(), &'static str> {
        if rec.file_id == 0 {
            return Err("reserved file id 0");
        }
        let base = self.meta.block_address(self.meta.unit_of(rec.address));
        let start = base + self.meta.data_start;
        let end = base + self.meta.geometry.block_size;
        match rec.data_address.checked_add(rec.total_length) {
            Some(stop) if rec.data_address >= start && stop <= end => Ok(()),
            _ => Err("payload outside its block"),
        }
    }

    fn identifier(&self) -> &'static str {
        "slotted"
    }
}

impl<'a, IO: FlashIO + ?Sized> FlashFs<'a, IO, SlotLayout> {
    /// Mounts the slotted layout over the first `region_len` bytes of `io`.
    pub fn mount_region(io: &'a mut IO, region_len: u32) -> FsResult<Self> {
        let layout = SlotLayout::for_region(&*io, region_len);
        Self::mount(io, layout)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::core::cursor::find_live_head;
    use crate::core::utils::checksum_utils::digest;
    use flashio::prelude::*;

    fn request<'d>(name: &str, data: &'d [u8], file_id: FileId) -> WriteRequest<'d> {
        WriteRequest {
            name: FileName::new(name).unwrap(),
            data,
            file_id,
            hash: digest(data),
            verify: true,
        }
    }

    #[test]
    fn test_mount_rebuilds_accounting() {
        let mut buf = vec![0xFFu8; 16 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 16 * 1024);

        layout.write_file(&mut io, &request("a", &[1; 300], 3)).unwrap();
        layout.write_file(&mut io, &request("b", &[2; 2700], 7)).unwrap();
        assert_eq!(layout.used_bytes(), 1536 + 3840);
        assert_eq!(layout.formatted_blocks(), 2);

        let mut fresh = SlotLayout::for_region(&io, 16 * 1024);
        let stats = fresh.mount(&mut io).unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.last_id, 7);
        assert_eq!(fresh.used_bytes(), layout.used_bytes());
    }

    #[test]
    fn test_unlink_keeps_space_until_reclaim() {
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 8 * 1024);

        layout.write_file(&mut io, &request("a", b"one", 1)).unwrap();
        let used = layout.used_bytes();
        assert_eq!(layout.remove(&mut io, 1).unwrap(), 1);
        assert_eq!(layout.remove(&mut io, 1).unwrap(), 0);
        assert_eq!(layout.used_bytes(), used);

        let name = FileName::new("a").unwrap();
        assert!(find_live_head(&mut io, &layout, &name).unwrap().is_none());

        // deleted ids are still burned
        let stats = layout.clone().mount(&mut io).unwrap();
        assert_eq!(stats.last_id, 1);

        assert_eq!(layout.reclaim(&mut io).unwrap(), 1);
        assert_eq!(layout.used_bytes(), 0);
        assert!(io.is_erased(0, 4096).unwrap());
    }

    fn stray_block(io: &mut MemFlash<'_>, meta: &SlotMeta) {
        let header = SlotDirHeader::new(meta.slots_per_block, meta.data_start);
        io.write_struct(0, &header, true).unwrap();
        io.write_at(meta.data_start, &[0x42; 8]).unwrap();
    }

    #[test]
    fn test_stray_payload_counts_as_used() {
        let mut buf = vec![0xFFu8; 4096];
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 4096);
        stray_block(&mut io, &layout.meta);

        layout.mount(&mut io).unwrap();
        assert_eq!(layout.used_bytes(), 1024 + 256);
        assert_eq!(layout.formatted_blocks(), 1);

        // the next file goes past the stray bytes instead of failing
        layout.write_file(&mut io, &request("a", &[9; 100], 1)).unwrap();
        let name = FileName::new("a").unwrap();
        let head = find_live_head(&mut io, &layout, &name).unwrap().unwrap();
        assert_eq!(head.data_address, 1024 + 256);
        assert_eq!(layout.used_bytes(), 1024 + 512);
        assert_eq!(layout.reclaim(&mut io).unwrap(), 0);
    }

    #[test]
    fn test_reclaim_erases_block_with_only_stray_payload() {
        let mut buf = vec![0xFFu8; 4096];
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 4096);
        stray_block(&mut io, &layout.meta);
        layout.mount(&mut io).unwrap();

        assert_eq!(layout.reserve(&mut io, 3072, None), Err(FsAllocatorError::Full));
        assert_eq!(layout.reclaim(&mut io).unwrap(), 1);
        assert_eq!(layout.used_bytes(), 0);
        assert!(io.is_erased(0, 4096).unwrap());

        layout.write_file(&mut io, &request("big", &[1; 3072], 2)).unwrap();
        assert_eq!(layout.used_bytes(), 4096);
    }

    #[test]
    fn test_reserve_full_when_slots_run_out() {
        let mut buf = vec![0xFFu8; 4096];
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 4096);

        for id in 1..=7 {
            layout.write_file(&mut io, &request("f", b"x", id)).unwrap();
        }
        assert_eq!(layout.reserve(&mut io, 1, Some(7)), Err(FsAllocatorError::Full));
        assert_eq!(
            layout.write_file(&mut io, &request("f", b"x", 8)),
            Err(FsWriterError::Allocator(FsAllocatorError::Full))
        );
    }

    #[test]
    fn test_format_stays_inside_region() {
        let mut buf = vec![0xFFu8; 16 * 1024];
        buf[12 * 1024] = 0x5A;
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 8 * 1024);

        layout.write_file(&mut io, &request("a", b"abc", 1)).unwrap();
        layout.format(&mut io).unwrap();
        assert!(io.is_erased(0, 8 * 1024).unwrap());
        assert_eq!(io.read_u8_at(12 * 1024).unwrap(), 0x5A);
    }

    #[test]
    fn test_read_rejects_payload_outside_block() {
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut layout = SlotLayout::for_region(&io, 8 * 1024);
        layout.write_file(&mut io, &request("a", b"abc", 1)).unwrap();

        let name = FileName::new("a").unwrap();
        let mut head = find_live_head(&mut io, &layout, &name).unwrap().unwrap();
        let mut out = [0u8; 8];
        assert_eq!(layout.read_file(&mut io, &head, &mut out).unwrap(), 3);
        assert_eq!(&out[..3], b"abc");

        head.data_address = 4000;
        head.total_length = 200;
        assert!(layout.validate_record(&head).is_err());
        assert_eq!(
            layout.read_file(&mut io, &head, &mut [0u8; 256]),
            Err(FsReaderError::FileCorrupt)
        );
    }
}
