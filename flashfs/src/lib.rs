// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
#[macro_use]
extern crate alloc;

// Core Modules
pub mod core;
pub mod fs;

// Reusable types and traits
pub use crate::core::traits::*;

// Facade
pub use crate::core::filesystem::{FileIter, FlashFs, FsOptions};

// Filesystem layouts
#[cfg(feature = "chain")]
/// Chunked-chain layout for external SPI NOR parts.
///
/// See [`chain::ChainLayout`], [`chain::ChainAllocator`], and [`chain::ChainInjector`].
pub mod chain {
    pub use super::fs::chain::prelude::*;
}

#[cfg(feature = "slotted")]
/// Slotted-directory layout for internal MCU flash.
///
/// See [`slotted::SlotLayout`], [`slotted::SlotAllocator`], and [`slotted::SlotInjector`].
pub mod slotted {
    pub use super::fs::slotted::prelude::*;
}
