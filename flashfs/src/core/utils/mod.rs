// SPDX-License-Identifier: MIT

pub mod checksum_utils;
pub mod name_utils;
