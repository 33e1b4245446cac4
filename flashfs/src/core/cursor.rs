// SPDX-License-Identifier: MIT

use flashio::FlashIO;

use crate::core::errors::FsCursorResult;
use crate::core::layout::FsLayout;
use crate::core::record::{FileId, FileName, FileRecord, ScanSlot};

/// Caller-owned scan position over a layout's records.
///
/// The cursor is a plain value: independent scans never share state, and a
/// scan can be paused and resumed by keeping the cursor around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    position: u32,
}

impl ScanCursor {
    #[inline]
    pub const fn new() -> Self {
        Self { position: 0 }
    }

    #[inline]
    pub const fn at(position: u32) -> Self {
        Self { position }
    }

    #[inline]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the current position and steps past it.
    #[inline]
    pub fn advance(&mut self) -> u32 {
        let current = self.position;
        self.position = self.position.saturating_add(1);
        current
    }

    /// One iteration step
    #[inline]
    pub fn next_with<IO, L>(&mut self, io: &mut IO, layout: &L) -> Option<FsCursorResult<ScanSlot>>
    where
        IO: FlashIO + ?Sized,
        L: FsLayout,
    {
        layout.next_record(io, self)
    }

    /// Iterate valid records (deleted ones included) via callback
    pub fn for_each_record<IO, L, F>(&mut self, io: &mut IO, layout: &L, mut f: F) -> FsCursorResult
    where
        IO: FlashIO + ?Sized,
        L: FsLayout,
        F: FnMut(&FileRecord) -> FsCursorResult,
    {
        while let Some(slot) = self.next_with(io, layout) {
            if let Some(rec) = slot?.record {
                f(&rec)?;
            }
        }
        Ok(())
    }

    /// Creates a slot-by-slot iterator
    pub fn iter<'b, IO, L>(&'b mut self, io: &'b mut IO, layout: &'b L) -> ScanIter<'b, IO, L>
    where
        IO: FlashIO + ?Sized,
        L: FsLayout,
    {
        ScanIter {
            cursor: self,
            io,
            layout,
        }
    }
}

/// Slot-by-slot iterator
pub struct ScanIter<'b, IO: ?Sized, L> {
    cursor: &'b mut ScanCursor,
    io: &'b mut IO,
    layout: &'b L,
}

impl<IO, L> Iterator for ScanIter<'_, IO, L>
where
    IO: FlashIO + ?Sized,
    L: FsLayout,
{
    type Item = FsCursorResult<ScanSlot>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_with(self.io, self.layout)
    }
}

/// Live head record named `name`.
///
/// A replace torn between writing the new generation and deleting the old one
/// leaves two live heads; the highest id is the newest and wins.
pub fn find_live_head<IO, L>(
    io: &mut IO,
    layout: &L,
    name: &FileName,
) -> FsCursorResult<Option<FileRecord>>
where
    IO: FlashIO + ?Sized,
    L: FsLayout,
{
    let mut best: Option<FileRecord> = None;
    ScanCursor::new().for_each_record(io, layout, |rec| {
        if rec.is_live() && rec.is_head() && rec.name == *name {
            match best {
                Some(b) if b.file_id >= rec.file_id => {}
                _ => best = Some(*rec),
            }
        }
        Ok(())
    })?;
    Ok(best)
}

/// Live head record of `id`.
pub fn find_head_by_id<IO, L>(io: &mut IO, layout: &L, id: FileId) -> FsCursorResult<Option<FileRecord>>
where
    IO: FlashIO + ?Sized,
    L: FsLayout,
{
    let mut cursor = ScanCursor::new();
    while let Some(slot) = cursor.next_with(io, layout) {
        if let Some(rec) = slot?.record
            && rec.is_live()
            && rec.is_head()
            && rec.file_id == id
        {
            return Ok(Some(rec));
        }
    }
    Ok(None)
}

/// Number of live records carrying `id`.
pub fn count_records<IO, L>(io: &mut IO, layout: &L, id: FileId) -> FsCursorResult<u32>
where
    IO: FlashIO + ?Sized,
    L: FsLayout,
{
    let mut count = 0;
    ScanCursor::new().for_each_record(io, layout, |rec| {
        if rec.is_live() && rec.file_id == id {
            count += 1;
        }
        Ok(())
    })?;
    Ok(count)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advance_and_reset() {
        let mut cursor = ScanCursor::at(3);
        assert_eq!(cursor.advance(), 3);
        assert_eq!(cursor.position(), 4);
        cursor.reset();
        assert_eq!(cursor, ScanCursor::new());

        let mut end = ScanCursor::at(u32::MAX);
        assert_eq!(end.advance(), u32::MAX);
        assert_eq!(end.position(), u32::MAX);
    }
}
