// SPDX-License-Identifier: MIT

//! Driver for SPI NOR parts of the W25Q family.
//!
//! Every erase and program is preceded by a write enable and followed by a
//! busy poll of status register 1 before the next command is issued.

use core::fmt::Debug;

use crate::{FlashGeometry, FlashIO, FlashIOError, FlashIOResult, FlashId, check_range};

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SpiCommand {
    WriteEnable = 0x06,
    ReadStatusReg1 = 0x05,
    ReadJedecId = 0x9F,
    ReadData = 0x03,
    PageProgram = 0x02,
    SectorErase4Kb = 0x20,
    ChipErase = 0x60,
}

// Status Register 1 bits
pub const BUSY_BIT: u8 = 0x01;
pub const WEL_BIT: u8 = 0x02;

/// Largest span reachable with the 3-byte addresses this driver sends.
pub const MAX_3BYTE_CAPACITY: u32 = 1 << 24;

/// Chip-select framed byte transport to the part.
///
/// `select` asserts CS, `deselect` releases it; the part executes erase and
/// program commands on the CS rising edge.
pub trait FlashBus {
    type Error: Debug;

    fn select(&mut self);
    fn deselect(&mut self);
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Status poll budgets. Chip erase is always polled without limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiNorTiming {
    /// Polls allowed for a page program or a plain ready wait.
    pub program_polls: u32,
    /// Polls allowed for a 4 KiB sector erase.
    pub erase_polls: u32,
}

impl Default for SpiNorTiming {
    fn default() -> Self {
        Self {
            program_polls: 10_000,
            erase_polls: 1_000_000,
        }
    }
}

#[derive(Debug)]
pub struct SpiNorFlash<B: FlashBus> {
    bus: B,
    geometry: FlashGeometry,
    timing: SpiNorTiming,
    partition_offset: u32,
}

impl<B: FlashBus> SpiNorFlash<B> {
    pub fn new(bus: B, geometry: FlashGeometry) -> Self {
        Self {
            bus,
            geometry,
            timing: SpiNorTiming::default(),
            partition_offset: 0,
        }
    }

    /// Reads the JEDEC id and derives a NOR geometry from its capacity code.
    ///
    /// Parts above 16 MiB are used as 16 MiB: addresses past that would wrap
    /// onto the low half without 4-byte addressing.
    pub fn probe(bus: B) -> FlashIOResult<Self> {
        let mut flash = Self::new(bus, FlashGeometry::nor(0));
        let id = flash.identify()?;
        let mut capacity = id
            .capacity_bytes()
            .ok_or(FlashIOError::Other("unsupported capacity code"))?;
        if capacity > MAX_3BYTE_CAPACITY {
            log::warn!(
                "spi nor: {capacity} byte part limited to {MAX_3BYTE_CAPACITY} bytes (3-byte addressing)"
            );
            capacity = MAX_3BYTE_CAPACITY;
        }
        log::debug!(
            "spi nor: manufacturer={:#04x} type={:#04x} capacity={capacity}",
            id.manufacturer,
            id.memory_type
        );
        flash.geometry = FlashGeometry::nor(capacity);
        Ok(flash)
    }

    pub fn with_timing(mut self, timing: SpiNorTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Runs one CS-framed transaction; CS is released even when the transfer fails.
    fn frame<F>(&mut self, f: F) -> FlashIOResult
    where
        F: FnOnce(&mut B) -> Result<(), B::Error>,
    {
        self.bus.select();
        let res = f(&mut self.bus);
        self.bus.deselect();
        res.map_err(|e| {
            log::error!("spi nor bus error: {e:?}");
            FlashIOError::Bus
        })
    }

    fn command(&mut self, cmd: SpiCommand, address: Option<u32>) -> FlashIOResult {
        let header = header(cmd, address);
        self.frame(|bus| bus.write(header.as_slice()))
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> FlashIOResult<u8> {
        let mut status = [0u8; 1];
        self.frame(|bus| {
            bus.write(&[SpiCommand::ReadStatusReg1 as u8])?;
            bus.read(&mut status)
        })?;
        Ok(status[0])
    }

    /// Polls until the busy bit clears. `None` polls without limit.
    fn wait_ready(&mut self, budget: Option<u32>) -> FlashIOResult {
        let mut polls = 0u32;
        while self.read_status()? & BUSY_BIT != 0 {
            polls += 1;
            if let Some(max) = budget {
                if polls >= max {
                    log::error!("spi nor still busy after {polls} polls");
                    return Err(FlashIOError::Timeout);
                }
            }
        }
        Ok(())
    }

    fn write_enable(&mut self) -> FlashIOResult {
        self.command(SpiCommand::WriteEnable, None)?;
        if self.read_status()? & WEL_BIT == 0 {
            return Err(FlashIOError::WriteEnableFailed);
        }
        Ok(())
    }

    #[inline]
    fn absolute(&self, offset: u32, len: usize) -> FlashIOResult<u32> {
        let abs = offset
            .checked_add(self.partition_offset)
            .ok_or(FlashIOError::OutOfBounds)?;
        check_range(abs, len, self.geometry.capacity)?;
        Ok(abs)
    }
}

/// Opcode followed by an optional 24-bit big-endian address.
struct Header {
    bytes: [u8; 4],
    len: usize,
}

impl Header {
    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

fn header(cmd: SpiCommand, address: Option<u32>) -> Header {
    match address {
        Some(a) => Header {
            bytes: [cmd as u8, (a >> 16) as u8, (a >> 8) as u8, a as u8],
            len: 4,
        },
        None => Header {
            bytes: [cmd as u8, 0, 0, 0],
            len: 1,
        },
    }
}

impl<B: FlashBus> FlashIO for SpiNorFlash<B> {
    #[inline]
    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        let abs = self.absolute(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let header = header(SpiCommand::ReadData, Some(abs));
        self.frame(|bus| {
            bus.write(header.as_slice())?;
            bus.read(buf)
        })
    }

    fn program_page(&mut self, offset: u32, data: &[u8]) -> FlashIOResult {
        let abs = self.absolute(offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        if data.len() > self.geometry.page_remaining(abs) as usize {
            return Err(FlashIOError::LargerThanPage);
        }

        let budget = Some(self.timing.program_polls);
        self.wait_ready(budget)?;
        self.write_enable()?;

        let header = header(SpiCommand::PageProgram, Some(abs));
        self.frame(|bus| {
            bus.write(header.as_slice())?;
            bus.write(data)
        })?;

        self.wait_ready(budget)
    }

    fn erase_block(&mut self, offset: u32) -> FlashIOResult {
        let abs = self.absolute(offset, 0)?;
        let aligned = self.geometry.block_base(abs);
        check_range(aligned, self.geometry.block_size as usize, self.geometry.capacity)?;

        self.wait_ready(Some(self.timing.program_polls))?;
        self.write_enable()?;
        self.command(SpiCommand::SectorErase4Kb, Some(aligned))?;
        self.wait_ready(Some(self.timing.erase_polls))
    }

    fn erase_all(&mut self) -> FlashIOResult {
        self.wait_ready(Some(self.timing.program_polls))?;
        self.write_enable()?;
        self.command(SpiCommand::ChipErase, None)?;
        // can take tens of seconds on large parts
        self.wait_ready(None)
    }

    fn identify(&mut self) -> FlashIOResult<FlashId> {
        let mut id = [0u8; 3];
        self.frame(|bus| {
            bus.write(&[SpiCommand::ReadJedecId as u8])?;
            bus.read(&mut id)
        })?;
        Ok(FlashId::from_jedec(id))
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

#[cfg(all(test, feature = "std", feature = "mem"))]
mod test {
    use super::*;
    use crate::prelude::*;
    use crate::sim::SimNorChip;

    #[test]
    fn test_probe_derives_geometry() {
        let chip = SimNorChip::new(0x10);
        let flash = SpiNorFlash::probe(chip).unwrap();
        assert_eq!(flash.geometry(), FlashGeometry::nor(65536));
    }

    #[test]
    fn test_probe_limits_large_parts_to_3byte_span() {
        let mut flash = SpiNorFlash::probe(SimNorChip::new(0x19)).unwrap();
        assert_eq!(flash.geometry(), FlashGeometry::nor(MAX_3BYTE_CAPACITY));

        flash.write_at(0, &[0x11; 4]).unwrap();
        assert_eq!(
            flash.write_at(MAX_3BYTE_CAPACITY, &[0x22; 4]),
            Err(FlashIOError::OutOfBounds)
        );
        flash.write_at(MAX_3BYTE_CAPACITY - 4, &[0x33; 4]).unwrap();

        let mut out = [0u8; 4];
        flash.read_at(0, &mut out).unwrap();
        assert_eq!(out, [0x11; 4]);
        flash.read_at(MAX_3BYTE_CAPACITY - 4, &mut out).unwrap();
        assert_eq!(out, [0x33; 4]);
    }

    #[test]
    fn test_program_read_roundtrip() {
        let mut flash = SpiNorFlash::probe(SimNorChip::new(0x10)).unwrap();
        let data: Vec<u8> = (0..700u32).map(|i| i as u8).collect();
        flash.write_at(512, &data).unwrap();

        let mut out = vec![0u8; 700];
        flash.read_at(512, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_write_enable_precedes_program_and_erase() {
        let mut flash = SpiNorFlash::probe(SimNorChip::new(0x10)).unwrap();
        flash.program_page(0, &[0x12, 0x34]).unwrap();
        flash.erase_block(0).unwrap();
        flash.erase_all().unwrap();

        let ops: Vec<u8> = flash
            .bus()
            .executed()
            .iter()
            .copied()
            .filter(|&op| op != SpiCommand::ReadStatusReg1 as u8)
            .collect();
        assert_eq!(ops, vec![0x9F, 0x06, 0x02, 0x06, 0x20, 0x06, 0x60]);
    }

    #[test]
    fn test_erase_restores_ones() {
        let mut flash = SpiNorFlash::probe(SimNorChip::new(0x10)).unwrap();
        flash.write_at(4096, &[0u8; 256]).unwrap();
        flash.erase_block(4096 + 100).unwrap();
        assert!(flash.is_erased(4096, 4096).unwrap());
    }

    #[test]
    fn test_program_larger_than_page() {
        let mut flash = SpiNorFlash::probe(SimNorChip::new(0x10)).unwrap();
        assert_eq!(
            flash.program_page(128, &[0u8; 200]),
            Err(FlashIOError::LargerThanPage)
        );
    }

    #[test]
    fn test_busy_timeout() {
        let mut chip = SimNorChip::new(0x10);
        chip.set_stuck_busy(true);
        let mut flash = SpiNorFlash::new(chip, FlashGeometry::nor(65536)).with_timing(
            SpiNorTiming {
                program_polls: 8,
                erase_polls: 8,
            },
        );
        assert_eq!(flash.program_page(0, &[0]), Err(FlashIOError::Timeout));
    }

    #[test]
    fn test_write_enable_failure() {
        let mut chip = SimNorChip::new(0x10);
        chip.set_write_protected(true);
        let mut flash = SpiNorFlash::new(chip, FlashGeometry::nor(65536));
        assert_eq!(
            flash.erase_block(0),
            Err(FlashIOError::WriteEnableFailed)
        );
    }
}
