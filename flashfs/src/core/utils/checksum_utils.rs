// SPDX-License-Identifier: MIT

use md5::{Digest as _, Md5};

/// Length of a content digest.
pub const DIGEST_LEN: usize = 16;

/// MD5 of a whole file, as stored in its records.
pub type Digest = [u8; DIGEST_LEN];

/// One-shot digest of `data`.
#[inline]
pub fn digest(data: &[u8]) -> Digest {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Md5::digest(data));
    out
}

/// Incremental digest for content reassembled piecewise.
#[derive(Clone, Default)]
pub struct DigestAccumulator {
    inner: Md5,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finish(self) -> Digest {
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&self.inner.finalize());
        out
    }
}
