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
    pub use super::allocator::{ChainAllocator, ChainHandle};
    pub use super::filesystem::ChainLayout;
    pub use super::injector::ChainInjector;
    pub use super::meta::ChainMeta;
    pub use super::resolver::ChainResolver;
}

pub mod prelude {
    pub use super::constant::*;
    pub use super::traits::*;
    pub use super::types::ChainRecord;
    pub use crate::core::errors::*;
    pub use crate::core::record::*;
    pub use crate::core::traits::*;
    pub use crate::{FlashFs, FsOptions};
    pub use flashio::prelude::*;
}
