// SPDX-License-Identifier: MIT

// === Directory Layout ===

pub const SLOT_HEADER_MAGIC: u32 = 0x93f6_1b39;
pub const SLOT_HEADER_SIZE: u32 = 128;
pub const SLOT_HEADER_PADDING: usize = 116;

pub const SLOT_ENTRY_MAGIC: u32 = 0x7a3b_4411;
pub const SLOT_ENTRY_SIZE: u32 = 128;
pub const SLOT_ENTRY_PADDING: usize = 15;

/// Header plus seven entries fill the first kilobyte of a 4 KiB block.
pub const DEFAULT_SLOTS_PER_BLOCK: u32 = 7;
