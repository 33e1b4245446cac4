// SPDX-License-Identifier: MIT

pub use flashio::errors::*;

use crate::core::fault::FaultKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsRecordError {
    BadMagic,
    NameTooLong,
    InvalidName,
    Invalid(&'static str),
    Other(&'static str),
}

impl FsRecordError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsRecordError::BadMagic => "Bad record magic",
            FsRecordError::NameTooLong => "File name too long",
            FsRecordError::InvalidName => "Invalid file name",
            FsRecordError::Invalid(msg) => msg,
            FsRecordError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsCursorError {
    IO(FlashIOError),
    Record(FsRecordError),
    Other(&'static str),
}

impl FsCursorError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsCursorError::IO(_) => "IO error",
            FsCursorError::Record(_) => "Record error",
            FsCursorError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsCursorError::IO(e) => Some(FsError::IO(*e)),
            FsCursorError::Record(e) => Some(FsError::Record(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsAllocatorError {
    IO(FlashIOError),
    Cursor(FsCursorError),
    /// Not enough free blocks or slots for the request.
    Full,
    /// Reserved; no allocation path produces it.
    Fragmented,
    Other(&'static str),
}

impl FsAllocatorError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsAllocatorError::IO(_) => "IO error",
            FsAllocatorError::Cursor(_) => "Cursor error",
            FsAllocatorError::Full => "Filesystem full",
            FsAllocatorError::Fragmented => "Filesystem fragmented",
            FsAllocatorError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsAllocatorError::IO(e) => Some(FsError::IO(*e)),
            FsAllocatorError::Cursor(e) => Some(FsError::Cursor(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsWriterError {
    IO(FlashIOError),
    Cursor(FsCursorError),
    Allocator(FsAllocatorError),
    Record(FsRecordError),
    Other(&'static str),
}

impl FsWriterError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsWriterError::IO(_) => "IO error",
            FsWriterError::Cursor(_) => "Cursor error",
            FsWriterError::Allocator(_) => "Allocator error",
            FsWriterError::Record(_) => "Record error",
            FsWriterError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsWriterError::IO(e) => Some(FsError::IO(*e)),
            FsWriterError::Cursor(e) => Some(FsError::Cursor(*e)),
            FsWriterError::Allocator(e) => Some(FsError::Allocator(*e)),
            FsWriterError::Record(e) => Some(FsError::Record(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsReaderError {
    IO(FlashIOError),
    Cursor(FsCursorError),
    Record(FsRecordError),
    InvalidFileId,
    FileNotFound,
    /// Missing chunk or digest mismatch.
    FileCorrupt,
    BufferTooSmall,
    Other(&'static str),
}

impl FsReaderError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsReaderError::IO(_) => "IO error",
            FsReaderError::Cursor(_) => "Cursor error",
            FsReaderError::Record(_) => "Record error",
            FsReaderError::InvalidFileId => "Invalid file id",
            FsReaderError::FileNotFound => "File not found",
            FsReaderError::FileCorrupt => "File corrupt",
            FsReaderError::BufferTooSmall => "Buffer too small",
            FsReaderError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsReaderError::IO(e) => Some(FsError::IO(*e)),
            FsReaderError::Cursor(e) => Some(FsError::Cursor(*e)),
            FsReaderError::Record(e) => Some(FsError::Record(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsCheckerError {
    IO(FlashIOError),
    Cursor(FsCursorError),
    Record(FsRecordError),
    Reader(FsReaderError),
    Other(&'static str),
}

impl FsCheckerError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsCheckerError::IO(_) => "IO error",
            FsCheckerError::Cursor(_) => "Cursor error",
            FsCheckerError::Record(_) => "Record error",
            FsCheckerError::Reader(_) => "Reader error",
            FsCheckerError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsCheckerError::IO(e) => Some(FsError::IO(*e)),
            FsCheckerError::Cursor(e) => Some(FsError::Cursor(*e)),
            FsCheckerError::Record(e) => Some(FsError::Record(*e)),
            FsCheckerError::Reader(e) => Some(FsError::Reader(*e)),
            _ => None,
        }
    }
}

/// Top-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    IO(FlashIOError),
    Record(FsRecordError),
    Cursor(FsCursorError),
    Allocator(FsAllocatorError),
    Writer(FsWriterError),
    Reader(FsReaderError),
    Checker(FsCheckerError),
    Other(&'static str),
}

impl FsError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsError::IO(e) => e.msg(),
            FsError::Record(e) => e.msg(),
            FsError::Cursor(e) => e.msg(),
            FsError::Allocator(e) => e.msg(),
            FsError::Writer(e) => e.msg(),
            FsError::Reader(e) => e.msg(),
            FsError::Checker(e) => e.msg(),
            FsError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsError::Cursor(e) => e.source(),
            FsError::Allocator(e) => e.source(),
            FsError::Writer(e) => e.source(),
            FsError::Reader(e) => e.source(),
            FsError::Checker(e) => e.source(),
            FsError::Record(e) => e.source(),
            FsError::IO(_) => None,
            FsError::Other(_) => None,
        }
    }

    /// Innermost cause, with the layer wrappers peeled off.
    pub fn root(&self) -> FsError {
        let mut current = *self;
        while let Some(src) = current.source() {
            current = src;
        }
        current
    }

    /// Flat classification of the innermost cause.
    pub fn kind(&self) -> FsErrorKind {
        match self.root() {
            FsError::IO(e) => match e {
                FlashIOError::MisalignedPage => FsErrorKind::MisalignedPage,
                FlashIOError::LargerThanPage => FsErrorKind::LargerThanPage,
                FlashIOError::VerifyFailed => FsErrorKind::VerifyFailed,
                FlashIOError::Timeout => FsErrorKind::Timeout,
                FlashIOError::Bus | FlashIOError::WriteEnableFailed => FsErrorKind::Bus,
                _ => FsErrorKind::Io,
            },
            FsError::Record(e) => match e {
                FsRecordError::NameTooLong => FsErrorKind::NameTooLong,
                FsRecordError::InvalidName => FsErrorKind::InvalidName,
                _ => FsErrorKind::Other,
            },
            FsError::Allocator(e) => match e {
                FsAllocatorError::Full => FsErrorKind::Full,
                FsAllocatorError::Fragmented => FsErrorKind::Fragmented,
                _ => FsErrorKind::Other,
            },
            FsError::Reader(e) => match e {
                FsReaderError::InvalidFileId => FsErrorKind::InvalidFileId,
                FsReaderError::FileNotFound => FsErrorKind::FileNotFound,
                FsReaderError::FileCorrupt => FsErrorKind::FileCorrupt,
                FsReaderError::BufferTooSmall => FsErrorKind::BufferTooSmall,
                _ => FsErrorKind::Other,
            },
            _ => FsErrorKind::Other,
        }
    }

    /// Fault indicator this error raises, if any.
    ///
    /// Caller mistakes (bad names, unknown files, short buffers) raise none.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self.kind() {
            FsErrorKind::Full | FsErrorKind::Fragmented => Some(FaultKind::Full),
            FsErrorKind::VerifyFailed => Some(FaultKind::VerifyFailed),
            FsErrorKind::MisalignedPage
            | FsErrorKind::LargerThanPage
            | FsErrorKind::Timeout
            | FsErrorKind::Bus
            | FsErrorKind::Io
            | FsErrorKind::FileCorrupt => Some(FaultKind::Storage),
            FsErrorKind::FileNotFound
            | FsErrorKind::InvalidFileId
            | FsErrorKind::NameTooLong
            | FsErrorKind::InvalidName
            | FsErrorKind::BufferTooSmall
            | FsErrorKind::Other => None,
        }
    }
}

/// Flat error taxonomy, independent of the layer that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    Full,
    Fragmented,
    FileNotFound,
    InvalidFileId,
    FileCorrupt,
    MisalignedPage,
    LargerThanPage,
    VerifyFailed,
    NameTooLong,
    InvalidName,
    BufferTooSmall,
    Timeout,
    Bus,
    Io,
    Other,
}

// === type Fs*Result ===

pub type FsResult<T = ()> = Result<T, FsError>;
pub type FsRecordResult<T = ()> = Result<T, FsRecordError>;
pub type FsCursorResult<T = ()> = Result<T, FsCursorError>;
pub type FsAllocatorResult<T = ()> = Result<T, FsAllocatorError>;
pub type FsWriterResult<T = ()> = Result<T, FsWriterError>;
pub type FsReaderResult<T = ()> = Result<T, FsReaderError>;
pub type FsCheckerResult<T = ()> = Result<T, FsCheckerError>;

crate::fs_error_display!(
    FsRecordError,
    FsCursorError,
    FsAllocatorError,
    FsWriterError,
    FsReaderError,
    FsCheckerError,
    FsError,
);

crate::fs_error_wiring! {
    top => FsError {
        FlashIOError     : IO,
        FsRecordError    : Record,
        FsCursorError    : Cursor,
        FsAllocatorError : Allocator,
        FsWriterError    : Writer,
        FsReaderError    : Reader,
        FsCheckerError   : Checker,
    },
    str_into => [
        FsRecordError,
        FsCursorError,
        FsAllocatorError,
        FsWriterError,
        FsReaderError,
        FsCheckerError,
    ],
    sub => {
        FlashIOError     => [ FsCursorError::IO, FsAllocatorError::IO, FsWriterError::IO, FsReaderError::IO, FsCheckerError::IO ],
        FsRecordError    => [ FsCursorError::Record, FsWriterError::Record, FsReaderError::Record, FsCheckerError::Record ],
        FsCursorError    => [ FsAllocatorError::Cursor, FsWriterError::Cursor, FsReaderError::Cursor, FsCheckerError::Cursor ],
        FsAllocatorError => [ FsWriterError::Allocator ],
        FsReaderError    => [ FsCheckerError::Reader ],
    },
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_display() {
        let low = FlashIOError::Timeout;
        let top = FsError::Writer(FsWriterError::Allocator(FsAllocatorError::IO(low)));

        let text = top.to_string();
        assert!(text.starts_with("Allocator error"));
        assert!(text.contains("caused by: IO error"));
        assert!(text.contains("caused by: Flash busy timeout"));
    }

    #[test]
    fn test_kind_sees_through_layers() {
        let full: FsError = FsWriterError::Allocator(FsAllocatorError::Full).into();
        assert_eq!(full.kind(), FsErrorKind::Full);
        assert_eq!(full.fault_kind(), Some(FaultKind::Full));

        let verify: FsError = FsWriterError::IO(FlashIOError::VerifyFailed).into();
        assert_eq!(verify.kind(), FsErrorKind::VerifyFailed);
        assert_eq!(verify.fault_kind(), Some(FaultKind::VerifyFailed));

        let missing: FsError = FsReaderError::FileNotFound.into();
        assert_eq!(missing.kind(), FsErrorKind::FileNotFound);
        assert_eq!(missing.fault_kind(), None);
    }

    #[test]
    fn test_str_into_other() {
        let e: FsWriterError = "boom".into();
        assert_eq!(e, FsWriterError::Other("boom"));
        let top: FsError = "boom".into();
        assert_eq!(top.kind(), FsErrorKind::Other);
    }
}
