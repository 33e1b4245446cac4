// SPDX-License-Identifier: MIT

pub use crate::core::errors::{FsAllocatorError, FsAllocatorResult};

use flashio::FlashIO;

/// Trait implemented by all layout allocation handles.
///
/// Example: block handle, slot handle, etc.
pub trait FsHandle {
    /// Medium address the payload goes to.
    fn data_address(&self) -> u32;
}

/// Trait for finding room on the medium.
///
/// Free space is discovered by scanning records, so every call takes the medium.
pub trait FsAllocator<Handle: FsHandle + Sized + Clone> {
    /// Reserve room for a payload of `len` bytes and return its handle.
    fn allocate<IO: FlashIO + ?Sized>(&mut self, io: &mut IO, len: u32)
    -> FsAllocatorResult<Handle>;

    /// Number of units currently used.
    fn used_units(&self) -> u32;

    /// Number of remaining units.
    fn remaining_units(&self) -> u32;
}
