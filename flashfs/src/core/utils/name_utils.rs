// SPDX-License-Identifier: MIT

use crate::core::errors::{FsRecordError, FsRecordResult};

/// Size of the NUL-padded filename field in every record.
pub const FILENAME_LEN: usize = 80;

/// Checks a name fits the record field with at least one NUL terminator.
pub fn validate_name(name: &str) -> FsRecordResult {
    if name.is_empty() || name.bytes().any(|b| b == 0) {
        return Err(FsRecordError::InvalidName);
    }
    if name.len() >= FILENAME_LEN {
        return Err(FsRecordError::NameTooLong);
    }
    Ok(())
}

/// Encodes a validated name into the on-media field.
pub fn encode_name(name: &str) -> FsRecordResult<[u8; FILENAME_LEN]> {
    validate_name(name)?;
    let mut field = [0u8; FILENAME_LEN];
    field[..name.len()].copy_from_slice(name.as_bytes());
    Ok(field)
}

/// Name bytes of an on-media field, up to the first NUL.
#[inline]
pub fn trim_name(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("settings.cfg").is_ok());
        assert_eq!(validate_name(""), Err(FsRecordError::InvalidName));
        assert_eq!(validate_name("a\0b"), Err(FsRecordError::InvalidName));
        assert!(validate_name(&"x".repeat(FILENAME_LEN - 1)).is_ok());
        assert_eq!(
            validate_name(&"x".repeat(FILENAME_LEN)),
            Err(FsRecordError::NameTooLong)
        );
    }

    #[test]
    fn test_encode_trim() {
        let field = encode_name("log.bin").unwrap();
        assert_eq!(trim_name(&field), b"log.bin");
        assert_eq!(trim_name(&[0xFFu8; 4]), &[0xFF; 4]);
    }
}
