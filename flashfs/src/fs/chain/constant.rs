// SPDX-License-Identifier: MIT

// === Record Layout ===

pub const CHAIN_MAGIC: u32 = 0x947a_6e2e;
pub const CHAIN_RECORD_SIZE: usize = 256;
pub const CHAIN_RECORD_PADDING: usize = 135;

/// Payload starts right after the record, on the next page.
pub const CHAIN_PAYLOAD_OFFSET: u32 = CHAIN_RECORD_SIZE as u32;

// === Nominal Geometry ===

pub const CHAIN_BLOCK_SIZE: u32 = 4096;
pub const CHAIN_USABLE_PER_BLOCK: u32 = CHAIN_BLOCK_SIZE - CHAIN_PAYLOAD_OFFSET; // 3840
