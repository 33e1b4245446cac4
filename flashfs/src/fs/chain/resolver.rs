// SPDX-License-Identifier: MIT

use flashio::FlashIO;

use crate::core::cursor::ScanCursor;
use crate::core::errors::*;
use crate::core::record::FileRecord;
use crate::fs::chain::filesystem::ChainLayout;

/// Reassembles a chain into a caller buffer.
pub struct ChainResolver<'a, IO: FlashIO + ?Sized> {
    io: &'a mut IO,
    layout: &'a ChainLayout,
}

impl<'a, IO: FlashIO + ?Sized> ChainResolver<'a, IO> {
    pub fn new(io: &'a mut IO, layout: &'a ChainLayout) -> Self {
        Self { io, layout }
    }

    /// Copies every chunk of `head`'s file to `chunk_index * usable` in `out`.
    ///
    /// Length and chunk count come from the head record. A missing chunk, a
    /// chunk disagreeing on the chunk count, or a chunk index out of range
    /// makes the file corrupt.
    pub fn read_into(&mut self, head: &FileRecord, out: &mut [u8]) -> FsReaderResult<usize> {
        let total = head.total_length as usize;
        if out.len() < total {
            return Err(FsReaderError::BufferTooSmall);
        }

        let usable = self.layout.meta.usable_per_block;
        let mut found = 0u32;
        let mut accumulated = 0usize;

        let mut cursor = ScanCursor::new();
        while let Some(slot) = cursor.next_with(self.io, self.layout) {
            let Some(rec) = slot?.record else {
                continue;
            };
            if !rec.is_live() || rec.file_id != head.file_id {
                continue;
            }
            if rec.chunk_count != head.chunk_count || rec.chunk_index >= head.chunk_count {
                log::warn!(
                    "chain id={}: chunk {}/{} disagrees with head ({} chunks)",
                    rec.file_id,
                    rec.chunk_index,
                    rec.chunk_count,
                    head.chunk_count
                );
                return Err(FsReaderError::FileCorrupt);
            }

            let offset = head_offset(head, &rec, usable);
            let len = head_chunk_len(head, &rec, usable);
            self.io
                .read_at(rec.data_address, &mut out[offset..offset + len])?;

            found += 1;
            accumulated += len;
            if found == head.chunk_count {
                break;
            }
        }

        if found != head.chunk_count || accumulated != total {
            log::warn!(
                "chain id={}: {found}/{} chunks, {accumulated}/{total} bytes",
                head.file_id,
                head.chunk_count
            );
            return Err(FsReaderError::FileCorrupt);
        }
        Ok(total)
    }
}

/// Offset of `rec`'s payload, measured with the head's length.
#[inline]
fn head_offset(head: &FileRecord, rec: &FileRecord, usable: u32) -> usize {
    (rec.chunk_index as usize * usable as usize).min(head.total_length as usize)
}

#[inline]
fn head_chunk_len(head: &FileRecord, rec: &FileRecord, usable: u32) -> usize {
    let offset = head_offset(head, rec, usable);
    (head.total_length as usize - offset).min(usable as usize)
}
