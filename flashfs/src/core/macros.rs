// SPDX-License-Identifier: MIT

/// Wires the layered error enums together.
///
/// - `top`: each sub-error converts into the listed top-level variant
/// - `str_into`: `&'static str` converts into `Other` of each listed error and of the top
/// - `sub`: a lower-layer error converts into the listed variant of an upper layer
#[macro_export]
macro_rules! fs_error_wiring {
    (
        top => $top:ty {
            $($top_src:ty : $top_variant:ident),+ $(,)?
        },
        str_into => [ $($str_tgt:ty),* $(,)? ],
        sub => {
            $($src_sub:ty => [ $($dst_sub:ident::$dst_variant:ident),+ ] ),* $(,)?
        } $(,)?
    ) => {
        $( $crate::fs_error_wiring!(@from $top_src => $top; $top_variant); )+

        $( $crate::fs_error_wiring!(@str $str_tgt); )*
        $crate::fs_error_wiring!(@str $top);

        $( $( $crate::fs_error_wiring!(@from $src_sub => $dst_sub; $dst_variant); )+ )*
    };

    (@from $src:ty => $dst:ty; $variant:ident) => {
        impl From<$src> for $dst {
            #[inline]
            fn from(e: $src) -> Self {
                <$dst>::$variant(e)
            }
        }
    };

    (@str $t:ty) => {
        impl From<&'static str> for $t {
            #[inline]
            fn from(msg: &'static str) -> Self {
                <$t>::Other(msg)
            }
        }
    };
}

/// Writes the `Display` impl shared by every error layer: the message, then
/// one "caused by" line per wrapped lower-layer error.
#[macro_export]
macro_rules! fs_error_display {
    ($($t:ty),+ $(,)?) => {
        $(
            impl ::core::fmt::Display for $t {
                fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                    write!(f, "{}", self.msg())?;
                    let mut current = self.source();
                    while let Some(src) = current {
                        write!(f, "\n  caused by: {}", src.msg())?;
                        current = src.source();
                    }
                    Ok(())
                }
            }
        )+
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}
