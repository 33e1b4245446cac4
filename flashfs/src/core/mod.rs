// SPDX-License-Identifier: MIT

// === Sub-modules ===
pub mod allocator;
#[cfg(feature = "alloc")]
pub mod checker;
pub mod cursor;
pub mod errors;
pub mod fault;
pub mod filesystem;
pub mod layout;
pub mod macros;
pub mod meta;
pub mod record;
pub mod utils;

// === Core Traits ===
pub mod traits {
    pub use super::allocator::{FsAllocator, FsHandle};
    #[cfg(feature = "alloc")]
    pub use super::checker::FsChecker;
    pub use super::fault::FaultSink;
    pub use super::layout::FsLayout;
    pub use super::meta::FsMeta;
}

// === Error types ===
pub use errors::*;

// === Records ===
pub use record::*;

// === Utilities ===
pub use utils::{checksum_utils::*, name_utils::*};
