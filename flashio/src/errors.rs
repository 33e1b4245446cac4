// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for FlashIO operations.
pub type FlashIOResult<T = ()> = core::result::Result<T, FlashIOError>;

/// Error type for FlashIO operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashIOError {
    Other(&'static str),
    OutOfBounds,
    Unsupported,
    /// Unaligned write that would cross a page boundary.
    MisalignedPage,
    /// Single page program larger than the room left in its page.
    LargerThanPage,
    /// Read-back after a write did not match.
    VerifyFailed,
    /// Status register stayed busy past the poll budget.
    Timeout,
    /// The write enable latch did not set.
    WriteEnableFailed,
    /// Underlying bus transfer failed.
    Bus,
}

impl FlashIOError {
    pub fn msg(&self) -> &'static str {
        match self {
            FlashIOError::Other(msg) => msg,
            FlashIOError::OutOfBounds => "Out of bounds",
            FlashIOError::Unsupported => "Unsupported operation",
            FlashIOError::MisalignedPage => "Misaligned page write",
            FlashIOError::LargerThanPage => "Program larger than page",
            FlashIOError::VerifyFailed => "Write verification failed",
            FlashIOError::Timeout => "Flash busy timeout",
            FlashIOError::WriteEnableFailed => "Write enable failed",
            FlashIOError::Bus => "Bus transfer failed",
        }
    }
}

impl From<&'static str> for FlashIOError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        FlashIOError::Other(msg)
    }
}

impl fmt::Display for FlashIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        Ok(())
    }
}
