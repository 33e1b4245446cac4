// SPDX-License-Identifier: MIT

use std::io::{Error, Read, Seek, SeekFrom, Write};

use crate::{
    ERASED_BYTE, FlashGeometry, FlashIO, FlashIOError, FlashIOResult, FlashId, check_range,
};

/// NOR emulation over any seekable byte stream (typically an image file).
///
/// Program ANDs into the existing content, erase writes `0xFF` blocks, so an
/// image produced here matches a dump of the physical chip.
#[derive(Debug)]
pub struct StdFlash<'a, T: Read + Write + Seek> {
    io: &'a mut T,
    geometry: FlashGeometry,
    partition_offset: u32,
}

impl<'a, T: Read + Write + Seek> StdFlash<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T, geometry: FlashGeometry) -> Self {
        Self {
            io,
            geometry,
            partition_offset: 0,
        }
    }

    #[inline]
    pub fn new_with_offset(io: &'a mut T, geometry: FlashGeometry, partition_offset: u32) -> Self {
        Self {
            io,
            geometry,
            partition_offset,
        }
    }

    #[inline]
    fn absolute(&self, offset: u32, len: usize) -> FlashIOResult<u32> {
        let abs = offset
            .checked_add(self.partition_offset)
            .ok_or(FlashIOError::OutOfBounds)?;
        check_range(abs, len, self.geometry.capacity)?;
        Ok(abs)
    }

    fn fill_erased(&mut self, abs: u32, len: usize) -> FlashIOResult {
        let ones = [ERASED_BYTE; crate::SCRATCH_BUF_SIZE];
        self.io.seek(SeekFrom::Start(abs as u64))?;
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(ones.len());
            self.io.write_all(&ones[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }
}

impl<'a, T: Read + Write + Seek> FlashIO for StdFlash<'a, T> {
    #[inline]
    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        let abs = self.absolute(offset, buf.len())?;
        self.io.seek(SeekFrom::Start(abs as u64))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn program_page(&mut self, offset: u32, data: &[u8]) -> FlashIOResult {
        let abs = self.absolute(offset, data.len())?;
        if data.len() > self.geometry.page_remaining(abs) as usize {
            return Err(FlashIOError::LargerThanPage);
        }

        let mut page = [0u8; crate::SCRATCH_BUF_SIZE];
        let mut off = abs;
        for chunk in data.chunks(page.len()) {
            let current = &mut page[..chunk.len()];
            self.io.seek(SeekFrom::Start(off as u64))?;
            self.io.read_exact(current)?;
            for (dst, src) in current.iter_mut().zip(chunk) {
                *dst &= *src;
            }
            self.io.seek(SeekFrom::Start(off as u64))?;
            self.io.write_all(current)?;
            off += chunk.len() as u32;
        }
        Ok(())
    }

    fn erase_block(&mut self, offset: u32) -> FlashIOResult {
        let abs = self.absolute(offset, 0)?;
        let base = self.geometry.block_base(abs);
        check_range(base, self.geometry.block_size as usize, self.geometry.capacity)?;
        self.fill_erased(base, self.geometry.block_size as usize)
    }

    fn erase_all(&mut self) -> FlashIOResult {
        self.fill_erased(0, self.geometry.capacity as usize)?;
        self.io.flush()?;
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

impl From<Error> for FlashIOError {
    #[cold]
    #[inline(never)]
    fn from(e: Error) -> Self {
        // Leak the string to produce a 'static str. Acceptable for error mapping.
        let leaked_str: &'static str = Box::leak(e.to_string().into_boxed_str());
        FlashIOError::Other(leaked_str)
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;
    use crate::prelude::*;
    use tempfile::tempfile;

    fn blank_image(capacity: u32) -> std::fs::File {
        let mut file = tempfile().unwrap();
        let mut io = StdFlash::new(&mut file, FlashGeometry::nor(capacity));
        io.erase_all().unwrap();
        file
    }

    #[test]
    fn test_rw() {
        let mut file = blank_image(8192);
        let mut io = StdFlash::new(&mut file, FlashGeometry::nor(8192));
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_program_ands_existing_bits() {
        let mut file = blank_image(8192);
        let mut io = StdFlash::new(&mut file, FlashGeometry::nor(8192));
        io.program_page(300, &[0xF0]).unwrap();
        io.program_page(300, &[0x3C]).unwrap();
        assert_eq!(io.read_u8_at(300).unwrap(), 0x30);
    }

    #[test]
    fn test_erase_block_restores() {
        let mut file = blank_image(8192);
        let mut io = StdFlash::new(&mut file, FlashGeometry::nor(8192));
        io.write_at(4096, &[0u8; 512]).unwrap();
        assert!(!io.is_erased(4096, 512).unwrap());
        io.erase_block(5000).unwrap();
        assert!(io.is_erased(0, 8192).unwrap());
    }

    #[test]
    fn test_out_of_bounds() {
        let mut file = blank_image(4096);
        let mut io = StdFlash::new(&mut file, FlashGeometry::nor(4096));
        assert_eq!(
            io.read_at(4095, &mut [0u8; 2]),
            Err(FlashIOError::OutOfBounds)
        );
        assert_eq!(io.erase_block(4096), Err(FlashIOError::OutOfBounds));
    }
}
