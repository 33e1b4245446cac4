// SPDX-License-Identifier: MIT

#[cfg(feature = "chain")]
pub mod chain;

#[cfg(feature = "slotted")]
pub mod slotted;
