// SPDX-License-Identifier: MIT

//! Behavioural model of a W25Q part behind a [`FlashBus`].
//!
//! Commands are latched while CS is asserted and executed on deselect, like
//! the real chip. Program and erase leave the part busy for a few status polls
//! and clear the write enable latch.

use alloc::vec;
use alloc::vec::Vec;

use crate::spi_nor::{BUSY_BIT, FlashBus, SpiCommand, WEL_BIT};
use crate::{DEFAULT_BLOCK_SIZE, DEFAULT_PAGE_SIZE, ERASED_BYTE};

/// Status polls a program or erase keeps the part busy for.
const BUSY_POLLS: u32 = 2;

/// Winbond manufacturer / W25Q memory type.
const JEDEC_MANUFACTURER: u8 = 0xEF;
const JEDEC_MEMORY_TYPE: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBusError {
    NotSelected,
    NoCommand,
}

#[derive(Debug)]
pub struct SimNorChip {
    memory: Vec<u8>,
    capacity_code: u8,
    selected: bool,
    frame: Vec<u8>,
    read_cursor: usize,
    wel: bool,
    busy: u32,
    stuck_busy: bool,
    write_protected: bool,
    executed: Vec<u8>,
}

impl SimNorChip {
    /// Blank chip of `1 << capacity_code` bytes.
    pub fn new(capacity_code: u8) -> Self {
        Self {
            memory: vec![ERASED_BYTE; 1usize << capacity_code],
            capacity_code,
            selected: false,
            frame: Vec::new(),
            read_cursor: 0,
            wel: false,
            busy: 0,
            stuck_busy: false,
            write_protected: false,
            executed: Vec::new(),
        }
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Raw access, bypassing NOR rules (fault injection).
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Opcodes of every completed transaction, in order.
    pub fn executed(&self) -> &[u8] {
        &self.executed
    }

    pub fn clear_log(&mut self) {
        self.executed.clear();
    }

    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// When set the write enable latch never sets.
    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    fn address(&self) -> Option<usize> {
        if self.frame.len() < 4 {
            return None;
        }
        let a = (self.frame[1] as usize) << 16 | (self.frame[2] as usize) << 8 | self.frame[3] as usize;
        Some(a % self.memory.len())
    }

    fn status(&mut self) -> u8 {
        let mut status = 0;
        if self.stuck_busy || self.busy > 0 {
            status |= BUSY_BIT;
            self.busy = self.busy.saturating_sub(1);
        }
        if self.wel {
            status |= WEL_BIT;
        }
        status
    }

    fn execute(&mut self) {
        let Some(&opcode) = self.frame.first() else {
            return;
        };
        self.executed.push(opcode);

        match opcode {
            op if op == SpiCommand::WriteEnable as u8 => {
                self.wel = !self.write_protected;
            }
            op if op == SpiCommand::PageProgram as u8 => {
                if let (true, Some(addr)) = (self.wel, self.address()) {
                    let page = DEFAULT_PAGE_SIZE as usize;
                    let base = addr - addr % page;
                    for (i, b) in self.frame[4..].iter().enumerate() {
                        // wraps inside the page like the real part
                        let at = base + (addr % page + i) % page;
                        self.memory[at] &= *b;
                    }
                    self.finish_write();
                }
            }
            op if op == SpiCommand::SectorErase4Kb as u8 => {
                if let (true, Some(addr)) = (self.wel, self.address()) {
                    let block = DEFAULT_BLOCK_SIZE as usize;
                    let base = addr - addr % block;
                    let end = (base + block).min(self.memory.len());
                    self.memory[base..end].fill(ERASED_BYTE);
                    self.finish_write();
                }
            }
            op if op == SpiCommand::ChipErase as u8 => {
                if self.wel {
                    self.memory.fill(ERASED_BYTE);
                    self.finish_write();
                }
            }
            _ => {}
        }
    }

    fn finish_write(&mut self) {
        self.wel = false;
        self.busy = BUSY_POLLS;
    }
}

impl FlashBus for SimNorChip {
    type Error = SimBusError;

    fn select(&mut self) {
        self.selected = true;
        self.frame.clear();
        self.read_cursor = 0;
    }

    fn deselect(&mut self) {
        if self.selected {
            self.execute();
        }
        self.selected = false;
        self.frame.clear();
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if !self.selected {
            return Err(SimBusError::NotSelected);
        }
        self.frame.extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        if !self.selected {
            return Err(SimBusError::NotSelected);
        }
        let opcode = *self.frame.first().ok_or(SimBusError::NoCommand)?;

        match opcode {
            op if op == SpiCommand::ReadStatusReg1 as u8 => {
                for b in buf.iter_mut() {
                    *b = self.status();
                }
            }
            op if op == SpiCommand::ReadJedecId as u8 => {
                let id = [JEDEC_MANUFACTURER, JEDEC_MEMORY_TYPE, self.capacity_code];
                for b in buf.iter_mut() {
                    *b = id.get(self.read_cursor).copied().unwrap_or(0);
                    self.read_cursor += 1;
                }
            }
            op if op == SpiCommand::ReadData as u8 => {
                let start = self.address().ok_or(SimBusError::NoCommand)?;
                let len = self.memory.len();
                for b in buf.iter_mut() {
                    *b = self.memory[(start + self.read_cursor) % len];
                    self.read_cursor += 1;
                }
            }
            _ => return Err(SimBusError::NoCommand),
        }
        Ok(())
    }
}
