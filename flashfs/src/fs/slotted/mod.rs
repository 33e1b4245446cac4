// SPDX-License-Identifier: MIT

pub mod allocator;
pub mod constant;
pub mod filesystem;
pub mod injector;
pub mod meta;
pub mod resolver;
pub mod types;

// === Public Interface ===
pub mod traits {
    pub use super::allocator::{BlockSummary, SlotAllocator, SlotHandle, summarize_block};
    pub use super::filesystem::SlotLayout;
    pub use super::injector::SlotInjector;
    pub use super::meta::SlotMeta;
    pub use super::resolver::SlotResolver;
}

pub mod prelude {
    pub use super::constant::*;
    pub use super::traits::*;
    pub use super::types::{SLOT_TOMBSTONE_OFFSET, SlotDirHeader, SlotEntry};
    pub use crate::core::errors::*;
    pub use crate::core::record::*;
    pub use crate::core::traits::*;
    pub use crate::{FlashFs, FsOptions};
    pub use flashio::prelude::*;
}
