// SPDX-License-Identifier: MIT

use crate::{
    ERASED_BYTE, FlashGeometry, FlashIO, FlashIOError, FlashIOResult, FlashId, check_range,
};

/// In-memory NOR emulation implementing `FlashIO`.
///
/// Erase sets bytes to `0xFF`; program can only clear bits (the new value is
/// ANDed into the old one), exactly like a real part. Useful for tests and as a
/// model of an MCU's internal flash region.
#[derive(Debug)]
pub struct MemFlash<'a> {
    buffer: &'a mut [u8],
    geometry: FlashGeometry,
    partition_offset: u32,
}

impl<'a> MemFlash<'a> {
    /// NOR geometry (256 B pages, 4 KiB blocks) over the whole buffer.
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let geometry = FlashGeometry::nor(buffer.len() as u32);
        Self::with_geometry(buffer, geometry)
    }

    #[inline]
    pub fn with_geometry(buffer: &'a mut [u8], geometry: FlashGeometry) -> Self {
        debug_assert!(geometry.capacity as usize <= buffer.len());
        Self {
            buffer,
            geometry,
            partition_offset: 0,
        }
    }

    #[inline]
    pub fn new_with_offset(buffer: &'a mut [u8], partition_offset: u32) -> Self {
        let mut io = Self::new(buffer);
        io.partition_offset = partition_offset;
        io
    }

    #[inline]
    fn absolute(&self, offset: u32, len: usize) -> FlashIOResult<usize> {
        let abs = offset
            .checked_add(self.partition_offset)
            .ok_or(FlashIOError::OutOfBounds)?;
        check_range(abs, len, self.geometry.capacity)?;
        Ok(abs as usize)
    }
}

impl<'a> FlashIO for MemFlash<'a> {
    #[inline]
    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    #[inline(always)]
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        let abs = self.absolute(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[abs..abs + buf.len()]);
        Ok(())
    }

    fn program_page(&mut self, offset: u32, data: &[u8]) -> FlashIOResult {
        let abs = self.absolute(offset, data.len())?;
        if data.len() > self.geometry.page_remaining(abs as u32) as usize {
            return Err(FlashIOError::LargerThanPage);
        }
        for (dst, src) in self.buffer[abs..abs + data.len()].iter_mut().zip(data) {
            *dst &= *src;
        }
        Ok(())
    }

    fn erase_block(&mut self, offset: u32) -> FlashIOResult {
        let abs = self.absolute(offset, 0)?;
        let base = self.geometry.block_base(abs as u32) as usize;
        let end = base + self.geometry.block_size as usize;
        if end > self.geometry.capacity as usize {
            return Err(FlashIOError::OutOfBounds);
        }
        self.buffer[base..end].fill(ERASED_BYTE);
        Ok(())
    }

    fn erase_all(&mut self) -> FlashIOResult {
        self.buffer[..self.geometry.capacity as usize].fill(ERASED_BYTE);
        Ok(())
    }

    fn identify(&mut self) -> FlashIOResult<FlashId> {
        Ok(FlashId {
            manufacturer: 0,
            memory_type: 0,
            capacity_code: FlashId::code_for_capacity(self.geometry.capacity),
        })
    }

    #[inline]
    fn set_offset(&mut self, partition_offset: u32) -> u32 {
        self.partition_offset = partition_offset;
        partition_offset
    }

    #[inline]
    fn partition_offset(&self) -> u32 {
        self.partition_offset
    }
}
