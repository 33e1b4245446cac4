// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core modules
pub mod errors;
mod macros;
pub mod spi_nor;
pub mod stats;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(all(feature = "mem", feature = "alloc"))]
pub mod sim;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::FlashGeometry;
    pub use super::FlashIO;
    pub use super::FlashIOExt;
    pub use super::FlashIOStructExt;
    pub use super::FlashId;
    pub use super::errors::*;
    pub use super::spi_nor::{FlashBus, SpiNorFlash, SpiNorTiming};
    pub use super::stats::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemFlash;

    #[cfg(feature = "std")]
    pub use super::std::StdFlash;
}

// Internal use
use errors::*;

// Constants

/// Nominal program page of the supported NOR parts.
pub const DEFAULT_PAGE_SIZE: u32 = 256;

/// Nominal erase block (4 KiB sector) of the supported NOR parts.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Value every byte reads back as after an erase.
pub const ERASED_BYTE: u8 = 0xFF;

/// Stack scratch used by read-back verification and struct reads.
/// One page keeps it safe for small MCU stacks.
pub const SCRATCH_BUF_SIZE: usize = 256;

/// Physical shape of a flash medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Largest unit programmable in one operation.
    pub page_size: u32,
    /// Smallest erasable unit.
    pub block_size: u32,
    /// Total addressable bytes.
    pub capacity: u32,
}

impl FlashGeometry {
    pub const fn new(page_size: u32, block_size: u32, capacity: u32) -> Self {
        Self {
            page_size,
            block_size,
            capacity,
        }
    }

    /// 256 B pages and 4 KiB sectors, the W25Q layout.
    pub const fn nor(capacity: u32) -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_BLOCK_SIZE, capacity)
    }

    #[inline]
    pub fn block_count(&self) -> u32 {
        self.capacity / self.block_size
    }

    #[inline]
    pub fn block_base(&self, address: u32) -> u32 {
        address - address % self.block_size
    }

    #[inline]
    pub fn page_offset(&self, address: u32) -> u32 {
        address % self.page_size
    }

    /// Bytes left in the page containing `address`.
    #[inline]
    pub fn page_remaining(&self, address: u32) -> u32 {
        self.page_size - self.page_offset(address)
    }
}

/// JEDEC identification triple (`0x9F` response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashId {
    pub manufacturer: u8,
    pub memory_type: u8,
    /// log2 of the capacity in bytes (0x18 = 16 MiB).
    pub capacity_code: u8,
}

impl FlashId {
    pub const fn from_jedec(raw: [u8; 3]) -> Self {
        Self {
            manufacturer: raw[0],
            memory_type: raw[1],
            capacity_code: raw[2],
        }
    }

    /// Code for the largest power of two not above `capacity`.
    pub fn code_for_capacity(capacity: u32) -> u8 {
        if capacity == 0 {
            0
        } else {
            (31 - capacity.leading_zeros()) as u8
        }
    }

    /// Capacity in bytes, `None` when the code does not fit the 32-bit address space.
    pub fn capacity_bytes(&self) -> Option<u32> {
        if self.capacity_code >= 32 {
            None
        } else {
            Some(1u32 << self.capacity_code)
        }
    }
}

// Traits

/// Flash medium abstraction trait.
///
/// Mirrors what a NOR part can physically do: reads anywhere, programs within a
/// single page (bits only go from 1 to 0), erases whole blocks back to `0xFF`.
/// Implementations may target RAM, image files, SPI chips, internal MCU flash.
pub trait FlashIO {
    /// Shape of the medium.
    fn geometry(&self) -> FlashGeometry;

    /// Reads `buf.len()` bytes into `buf` from `offset`.
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> FlashIOResult;

    /// Programs `data` at `offset`. The range must stay inside one page.
    fn program_page(&mut self, offset: u32, data: &[u8]) -> FlashIOResult;

    /// Erases the block containing `offset`.
    fn erase_block(&mut self, offset: u32) -> FlashIOResult;

    /// Erases the whole device, regardless of partition offset.
    fn erase_all(&mut self) -> FlashIOResult;

    /// Queries the part identity.
    fn identify(&mut self) -> FlashIOResult<FlashId>;

    fn set_offset(&mut self, partition_offset: u32) -> u32;
    fn partition_offset(&self) -> u32;
}

/// Extension helpers for FlashIO.
///
/// - page-splitting writes
/// - read-back verification
/// - erase checks and range erases
/// - little-endian primitive reads
pub trait FlashIOExt: FlashIO {
    /// Writes `data` at `offset` into previously erased storage.
    ///
    /// A page-aligned write is split into page programs. An unaligned write is
    /// issued as one program and must fit the remainder of its page, otherwise
    /// it fails with `MisalignedPage`.
    fn write_at(&mut self, offset: u32, data: &[u8]) -> FlashIOResult {
        if data.is_empty() {
            return Ok(());
        }

        let geometry = self.geometry();
        if geometry.page_offset(offset) != 0 {
            if data.len() > geometry.page_remaining(offset) as usize {
                return Err(FlashIOError::MisalignedPage);
            }
            return self.program_page(offset, data);
        }

        let mut off = offset;
        for chunk in data.chunks(geometry.page_size as usize) {
            self.program_page(off, chunk)?;
            off += chunk.len() as u32;
        }
        Ok(())
    }

    /// Compares the medium content at `offset` with `expected`.
    fn verify_at(&mut self, offset: u32, expected: &[u8]) -> FlashIOResult {
        let mut buf = [0u8; SCRATCH_BUF_SIZE];
        let mut off = offset;
        for chunk in expected.chunks(SCRATCH_BUF_SIZE) {
            let got = &mut buf[..chunk.len()];
            self.read_at(off, got)?;
            if got[..] != chunk[..] {
                log::error!("flash verify mismatch in [{off:#08x}; {}]", chunk.len());
                return Err(FlashIOError::VerifyFailed);
            }
            off += chunk.len() as u32;
        }
        Ok(())
    }

    /// `write_at` followed by a read-back comparison.
    fn write_verified(&mut self, offset: u32, data: &[u8]) -> FlashIOResult {
        self.write_at(offset, data)?;
        self.verify_at(offset, data)
    }

    /// True when every byte of the range reads as erased.
    fn is_erased(&mut self, offset: u32, len: usize) -> FlashIOResult<bool> {
        let mut buf = [0u8; SCRATCH_BUF_SIZE];
        let mut remaining = len;
        let mut off = offset;
        while remaining > 0 {
            let chunk = remaining.min(SCRATCH_BUF_SIZE);
            self.read_at(off, &mut buf[..chunk])?;
            if buf[..chunk].iter().any(|&b| b != ERASED_BYTE) {
                return Ok(false);
            }
            off += chunk as u32;
            remaining -= chunk;
        }
        Ok(true)
    }

    /// Erases every block touched by `[offset, offset + len)`.
    fn erase_range(&mut self, offset: u32, len: u32) -> FlashIOResult {
        if len == 0 {
            return Ok(());
        }
        let block_size = self.geometry().block_size;
        let first = offset / block_size;
        let last = (offset + len - 1) / block_size;
        for block in first..=last {
            self.erase_block(block * block_size)?;
        }
        Ok(())
    }

    // Implements little-endian readers for primitive types (u8, u16, u32)
    crate::flashio_impl_primitive_read!(u8, u16, u32);
}

impl<T: FlashIO + ?Sized> FlashIOExt for T {}

/// Extension trait for reading and writing on-media structs using zerocopy.
pub trait FlashIOStructExt: FlashIOExt {
    /// Reads a struct of type `T` from the given offset, returned by value.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u32,
    ) -> FlashIOResult<T> {
        let size = core::mem::size_of::<T>();
        assert!(size <= SCRATCH_BUF_SIZE, "read_struct: type too large");
        let mut buf = [0u8; SCRATCH_BUF_SIZE];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| FlashIOError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at the given offset.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::Immutable>(
        &mut self,
        offset: u32,
        val: &T,
        verify: bool,
    ) -> FlashIOResult {
        let bytes = val.as_bytes();
        if verify {
            self.write_verified(offset, bytes)
        } else {
            self.write_at(offset, bytes)
        }
    }
}

impl<T: FlashIO + ?Sized> FlashIOStructExt for T {}

/// Validates that `[offset, offset + len)` lies inside `capacity`.
#[inline]
pub(crate) fn check_range(offset: u32, len: usize, capacity: u32) -> FlashIOResult {
    let end = (offset as u64)
        .checked_add(len as u64)
        .ok_or(FlashIOError::OutOfBounds)?;
    if end > capacity as u64 {
        return Err(FlashIOError::OutOfBounds);
    }
    Ok(())
}
