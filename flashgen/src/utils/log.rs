// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Normal as u8);

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Quiet,
        2 => LogLevel::Verbose,
        _ => LogLevel::Normal,
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::utils::log_level() != $crate::utils::LogLevel::Quiet {
            eprintln!("[flashgen] {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => {
        if $crate::utils::log_level() == $crate::utils::LogLevel::Verbose {
            eprintln!("[flashgen] {}", format_args!($($arg)*));
        }
    };
}
