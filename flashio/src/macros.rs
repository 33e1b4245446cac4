// SPDX-License-Identifier: MIT

/// Automatically implements little-endian read functions for primitive types on FlashIO.
///
/// Writes are deliberately absent: a NOR program needs erased storage and the
/// callers go through `write_at` with whole records instead.
#[macro_export]
macro_rules! flashio_impl_primitive_read {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<read_ $ty _at>](&mut self, offset: u32) -> FlashIOResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )+
    };
}
