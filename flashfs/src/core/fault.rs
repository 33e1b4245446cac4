// SPDX-License-Identifier: MIT

/// Persistent fault conditions the store can raise on the host firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A write was refused for lack of space.
    Full,
    /// Read-back after programming did not match.
    VerifyFailed,
    /// Any other medium failure (bus, timeout, corrupt data).
    Storage,
}

impl FaultKind {
    pub const ALL: [FaultKind; 3] = [FaultKind::Full, FaultKind::VerifyFailed, FaultKind::Storage];

    #[inline]
    pub(crate) fn bit(self) -> u8 {
        match self {
            FaultKind::Full => 1 << 0,
            FaultKind::VerifyFailed => 1 << 1,
            FaultKind::Storage => 1 << 2,
        }
    }
}

/// Receiver of fault transitions, typically a fault LED or a status register.
///
/// `report(kind, true)` is issued when a write fails with `kind`,
/// `report(kind, false)` after the next successful write clears it.
pub trait FaultSink {
    fn report(&mut self, kind: FaultKind, active: bool);
}

/// Tracks which faults are raised so each transition is reported once.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FaultLatch {
    active: u8,
}

impl FaultLatch {
    pub(crate) fn raise(&mut self, kind: FaultKind, sink: Option<&mut (dyn FaultSink + '_)>) {
        if self.is_active(kind) {
            return;
        }
        self.active |= kind.bit();
        log::warn!("storage fault raised: {kind:?}");
        if let Some(sink) = sink {
            sink.report(kind, true);
        }
    }

    pub(crate) fn clear_all(&mut self, mut sink: Option<&mut (dyn FaultSink + '_)>) {
        for kind in FaultKind::ALL {
            if !self.is_active(kind) {
                continue;
            }
            self.active &= !kind.bit();
            log::debug!("storage fault cleared: {kind:?}");
            if let Some(sink) = sink.as_deref_mut() {
                sink.report(kind, false);
            }
        }
    }

    #[inline]
    pub(crate) fn is_active(&self, kind: FaultKind) -> bool {
        self.active & kind.bit() != 0
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<(FaultKind, bool)>);

    impl FaultSink for Log {
        fn report(&mut self, kind: FaultKind, active: bool) {
            self.0.push((kind, active));
        }
    }

    #[test]
    fn test_latch_reports_each_transition_once() {
        let mut log = Log::default();
        let mut latch = FaultLatch::default();

        latch.raise(FaultKind::Full, Some(&mut log));
        latch.raise(FaultKind::Full, Some(&mut log));
        latch.raise(FaultKind::Storage, None);
        assert!(latch.is_active(FaultKind::Full));
        assert!(latch.is_active(FaultKind::Storage));
        assert!(!latch.is_active(FaultKind::VerifyFailed));

        latch.clear_all(Some(&mut log));
        latch.clear_all(Some(&mut log));
        assert!(!latch.is_active(FaultKind::Full));
        assert_eq!(
            log.0,
            vec![
                (FaultKind::Full, true),
                (FaultKind::Full, false),
                (FaultKind::Storage, false)
            ]
        );
    }
}
