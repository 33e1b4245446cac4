// SPDX-License-Identifier: MIT

use flashio::FlashIO;

use crate::core::cursor::ScanCursor;
use crate::core::errors::*;
use crate::core::meta::FsMeta;
use crate::core::record::{FileId, FileRecord, MountStats, ScanSlot, WriteRequest};

/// On-media layout strategy behind the [`FlashFs`](crate::FlashFs) facade.
///
/// A layout owns the record format, free-space discovery and the space
/// accounting of its medium. The facade owns names, ids and digests.
pub trait FsLayout: Clone {
    /// Static geometry (e.g. `ChainMeta`).
    type Meta: FsMeta + Clone;

    fn meta(&self) -> &Self::Meta;

    /// Reads the record at the cursor position and advances the cursor one
    /// position. `None` at the end of the medium.
    fn next_record<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        cursor: &mut ScanCursor,
    ) -> Option<FsCursorResult<ScanSlot>>;

    /// Full scan rebuilding the space accounting.
    fn mount<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsCursorResult<MountStats>;

    /// Bytes accounted as used.
    fn used_bytes(&self) -> u32;

    /// Bytes managed by the layout.
    fn capacity(&self) -> u32 {
        self.meta().size_bytes()
    }

    /// Fails with `Full` when `len` bytes cannot be stored, counting the space
    /// the `replacing` generation gives back. Writes nothing.
    fn reserve<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        len: u32,
        replacing: Option<FileId>,
    ) -> FsAllocatorResult;

    /// Lays the file down; records are always programmed after their payload.
    fn write_file<IO: FlashIO + ?Sized>(
        &mut self,
        io: &mut IO,
        req: &WriteRequest<'_>,
    ) -> FsWriterResult;

    /// Copies the payload described by the head record into `out` and
    /// returns the byte count. Digest checking is left to the caller.
    fn read_file<IO: FlashIO + ?Sized>(
        &self,
        io: &mut IO,
        head: &FileRecord,
        out: &mut [u8],
    ) -> FsReaderResult<usize>;

    /// Deletes every record of `id`; returns how many were deleted.
    fn remove<IO: FlashIO + ?Sized>(&mut self, io: &mut IO, id: FileId) -> FsWriterResult<u32>;

    /// Wipes everything the layout manages.
    fn format<IO: FlashIO + ?Sized>(&mut self, io: &mut IO) -> FsWriterResult;

    /// Gives back space held by deleted records; returns erased units.
    fn reclaim<IO: FlashIO + ?Sized>(&mut self, _io: &mut IO) -> FsWriterResult<u32> {
        Ok(0)
    }

    /// Layout-specific consistency of one valid record.
    fn validate_record(&self, _rec: &FileRecord) -> Result<(), &'static str> {
        Ok(())
    }

    /// Optional: layout name for display and dispatch
    fn identifier(&self) -> &'static str {
        "UNKNOWN"
    }
}
