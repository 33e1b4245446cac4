// SPDX-License-Identifier: MIT

use crate::{FlashGeometry, FlashIO, FlashIOResult, FlashId};

/// Simple counters, no_std friendly.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct IoStats {
    pub reads: u64,
    pub read_bytes: u64,
    pub programs: u64,
    pub program_bytes: u64,
    pub erases: u64,
    pub chip_erases: u64,

    // Largest single transfer, useful to diagnose scan granularity
    pub max_read: u64,
}

impl IoStats {
    #[inline]
    pub fn reset(&mut self) {
        *self = IoStats::default();
    }
}

/// Transparent instrumentation wrapper.
pub struct IOCounter<'a, IO: FlashIO + ?Sized> {
    inner: &'a mut IO,
    pub stats: IoStats,
}

impl<'a, IO: FlashIO + ?Sized> IOCounter<'a, IO> {
    #[inline]
    pub fn new(inner: &'a mut IO) -> Self {
        Self {
            inner,
            stats: IoStats::default(),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> IoStats {
        self.stats
    }

    #[inline]
    pub fn into_inner(self) -> &'a mut IO {
        self.inner
    }
}

impl<'a, IO: FlashIO + ?Sized> FlashIO for IOCounter<'a, IO> {
    #[inline]
    fn geometry(&self) -> FlashGeometry {
        self.inner.geometry()
    }

    #[inline]
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        let len = buf.len() as u64;
        self.stats.reads += 1;
        self.stats.read_bytes += len;
        if self.stats.max_read < len {
            self.stats.max_read = len;
        }
        self.inner.read_at(offset, buf)
    }

    #[inline]
    fn program_page(&mut self, offset: u32, data: &[u8]) -> FlashIOResult {
        self.stats.programs += 1;
        self.stats.program_bytes += data.len() as u64;
        self.inner.program_page(offset, data)
    }

    #[inline]
    fn erase_block(&mut self, offset: u32) -> FlashIOResult {
        self.stats.erases += 1;
        self.inner.erase_block(offset)
    }

    #[inline]
    fn erase_all(&mut self) -> FlashIOResult {
        self.stats.chip_erases += 1;
        self.inner.erase_all()
    }

    #[inline]
    fn identify(&mut self) -> FlashIOResult<FlashId> {
        self.inner.identify()
    }

    #[inline]
    fn set_offset(&mut self, p: u32) -> u32 {
        self.inner.set_offset(p)
    }

    #[inline]
    fn partition_offset(&self) -> u32 {
        self.inner.partition_offset()
    }
}

#[cfg(all(test, feature = "std", feature = "mem"))]
mod test {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_counts_operations() {
        let mut buf = vec![0xFFu8; 8192];
        let mut flash = MemFlash::new(&mut buf);
        let mut io = IOCounter::new(&mut flash);

        io.write_at(0, &[0u8; 600]).unwrap();
        io.erase_block(4096).unwrap();
        let mut out = [0u8; 32];
        io.read_at(0, &mut out).unwrap();

        let stats = io.snapshot();
        assert_eq!(stats.programs, 3);
        assert_eq!(stats.program_bytes, 600);
        assert_eq!(stats.erases, 1);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.max_read, 32);

        io.stats.reset();
        assert_eq!(io.snapshot(), IoStats::default());
    }
}
