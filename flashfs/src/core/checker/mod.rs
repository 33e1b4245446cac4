// SPDX-License-Identifier: MIT

mod types;

#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::{collections::BTreeMap, format, vec::Vec};
#[cfg(feature = "std")]
use std::collections::BTreeMap;

use flashio::FlashIO;

pub use types::{
    CheckOptions, Finding, ReportDisplay, ReportDisplayOpts, Severity, VerifierOptionsLike,
    VerifyPhases, VerifyReport,
};

pub use crate::core::errors::{FsCheckerError, FsCheckerResult};

use crate::core::cursor::ScanCursor;
use crate::core::errors::FsCursorResult;
use crate::core::layout::FsLayout;
use crate::core::meta::FsMeta;
use crate::core::record::{FileId, FileRecord};
use crate::core::utils::checksum_utils::DigestAccumulator;

/// Trait for verifying the integrity of a mounted store.
///
/// Phases run in order; each one is skipped when its flag is not in the
/// options, and with `fail_fast` the run stops after the first phase that
/// reported an error.
pub trait FsChecker {
    type Options: VerifierOptionsLike + Default;

    fn check_with(&mut self, opt: &Self::Options) -> FsCheckerResult<VerifyReport> {
        let mut rep = VerifyReport::default();
        let phases: [(VerifyPhases, CheckPhase<Self>); 5] = [
            (VerifyPhases::RECORDS, Self::check_records),
            (VerifyPhases::CHAIN, Self::check_chain),
            (VerifyPhases::NAMES, Self::check_names),
            (VerifyPhases::CONTENT, Self::check_content),
            (VerifyPhases::ACCOUNTING, Self::check_accounting),
        ];
        for (phase, f) in phases {
            if !self.run_phase(opt, &mut rep, phase, f)? {
                break;
            }
        }
        Ok(rep)
    }

    fn check_all(&mut self) -> FsCheckerResult<VerifyReport> {
        self.check_with(&Self::Options::default())
    }

    fn check_records(&mut self, _opt: &Self::Options, _rep: &mut VerifyReport) -> FsCheckerResult {
        Ok(())
    }
    fn check_chain(&mut self, _opt: &Self::Options, _rep: &mut VerifyReport) -> FsCheckerResult {
        Ok(())
    }
    fn check_names(&mut self, _opt: &Self::Options, _rep: &mut VerifyReport) -> FsCheckerResult {
        Ok(())
    }
    fn check_content(&mut self, _opt: &Self::Options, _rep: &mut VerifyReport) -> FsCheckerResult {
        Ok(())
    }
    fn check_accounting(
        &mut self,
        _opt: &Self::Options,
        _rep: &mut VerifyReport,
    ) -> FsCheckerResult {
        Ok(())
    }

    /// Runs `f` when `phase` is enabled; `false` means stop here.
    fn run_phase(
        &mut self,
        opt: &Self::Options,
        rep: &mut VerifyReport,
        phase: VerifyPhases,
        f: CheckPhase<Self>,
    ) -> FsCheckerResult<bool> {
        if opt.phases().contains(phase) {
            f(self, opt, rep)?;
            if opt.fail_fast() && rep.has_error() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// One checker phase.
pub type CheckPhase<C> =
    fn(&mut C, &<C as FsChecker>::Options, &mut VerifyReport) -> FsCheckerResult;

/// Live records of one file id, grouped by a scan.
#[derive(Debug, Clone, Default)]
pub struct ChainSet {
    pub head: Option<FileRecord>,
    pub chunks: Vec<FileRecord>,
}

impl ChainSet {
    /// Head present, every index of `[0, chunk_count)` exactly once, and all
    /// chunks agreeing with the head on the chunk count.
    pub fn is_complete(&self) -> bool {
        let Some(head) = self.head else {
            return false;
        };
        if self.chunks.len() != head.chunk_count as usize {
            return false;
        }
        let mut seen = vec![false; self.chunks.len()];
        for rec in &self.chunks {
            if rec.chunk_count != head.chunk_count {
                return false;
            }
            match seen.get_mut(rec.chunk_index as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

/// Groups every live record by file id.
pub fn collect_chains<IO, L>(io: &mut IO, layout: &L) -> FsCursorResult<BTreeMap<FileId, ChainSet>>
where
    IO: FlashIO + ?Sized,
    L: FsLayout,
{
    let mut chains: BTreeMap<FileId, ChainSet> = BTreeMap::new();
    ScanCursor::new().for_each_record(io, layout, |rec| {
        if !rec.is_live() {
            return Ok(());
        }
        let set = chains.entry(rec.file_id).or_default();
        if rec.is_head() && set.head.is_none() {
            set.head = Some(*rec);
        }
        set.chunks.push(*rec);
        Ok(())
    })?;
    Ok(chains)
}

/// Checker for any [`FsLayout`], over the medium it is mounted on.
pub struct LayoutChecker<'c, IO: FlashIO + ?Sized, L: FsLayout> {
    io: &'c mut IO,
    layout: &'c L,
}

impl<'c, IO: FlashIO + ?Sized, L: FsLayout> LayoutChecker<'c, IO, L> {
    pub fn new(io: &'c mut IO, layout: &'c L) -> Self {
        Self { io, layout }
    }

    /// Digest of a whole file, read one chunk at a time.
    fn digest_of(&mut self, chain: &ChainSet, head: &FileRecord) -> FsCheckerResult<[u8; 16]> {
        let usable = self.layout.meta().payload_per_unit();
        let mut chunks: Vec<&FileRecord> = chain.chunks.iter().collect();
        chunks.sort_by_key(|rec| rec.chunk_index);

        let mut acc = DigestAccumulator::new();
        let mut buf = [0u8; 256];
        for rec in chunks {
            let mut offset = 0u32;
            let len = head_chunk_len(head, rec, usable);
            while offset < len {
                let n = (len - offset).min(buf.len() as u32);
                self.io
                    .read_at(rec.data_address + offset, &mut buf[..n as usize])?;
                acc.update(&buf[..n as usize]);
                offset += n;
            }
        }
        Ok(acc.finish())
    }
}

/// Bytes of `rec`'s chunk, measured against the head's length.
fn head_chunk_len(head: &FileRecord, rec: &FileRecord, usable: u32) -> u32 {
    let offset = rec.chunk_index as u64 * usable as u64;
    (head.total_length as u64)
        .saturating_sub(offset)
        .min(usable as u64) as u32
}

impl<IO: FlashIO + ?Sized, L: FsLayout> FsChecker for LayoutChecker<'_, IO, L> {
    type Options = CheckOptions;

    fn check_records(&mut self, _opt: &CheckOptions, rep: &mut VerifyReport) -> FsCheckerResult {
        let mut live = 0u32;
        let mut deleted = 0u32;
        for slot in ScanCursor::new().iter(&mut *self.io, self.layout) {
            let Some(rec) = slot?.record else {
                continue;
            };
            if rec.is_live() {
                live += 1;
            } else {
                deleted += 1;
            }
            if let Err(why) = self.layout.validate_record(&rec) {
                rep.push(Finding::err(
                    "RECORD",
                    format!("id {} at {:#x}: {why}", rec.file_id, rec.address),
                ));
            }
        }
        rep.push(Finding::info(
            "RECORDS",
            format!("{live} live, {deleted} deleted ({})", self.layout.identifier()),
        ));
        Ok(())
    }

    fn check_chain(&mut self, _opt: &CheckOptions, rep: &mut VerifyReport) -> FsCheckerResult {
        let chains = collect_chains(self.io, self.layout)?;
        for (id, chain) in &chains {
            if chain.is_complete() {
                continue;
            }
            match chain.head {
                None => rep.push(Finding::warn(
                    "ORPHAN",
                    format!("id {id}: {} chunk(s) without a head", chain.chunks.len()),
                )),
                Some(head) => rep.push(Finding::err(
                    "CHAIN",
                    format!(
                        "id {id} ({}): {} of {} chunk(s), indices not contiguous",
                        head.name,
                        chain.chunks.len(),
                        head.chunk_count
                    ),
                )),
            }
        }
        Ok(())
    }

    fn check_names(&mut self, _opt: &CheckOptions, rep: &mut VerifyReport) -> FsCheckerResult {
        let chains = collect_chains(self.io, self.layout)?;
        let mut heads: Vec<FileRecord> = chains.values().filter_map(|c| c.head).collect();
        heads.sort_by(|a, b| a.name.raw().cmp(b.name.raw()).then(a.file_id.cmp(&b.file_id)));
        for pair in heads.windows(2) {
            if pair[0].name == pair[1].name {
                rep.push(Finding::warn(
                    "DUPNAME",
                    format!(
                        "{}: ids {} and {} both live, {} wins",
                        pair[0].name, pair[0].file_id, pair[1].file_id, pair[1].file_id
                    ),
                ));
            }
        }
        Ok(())
    }

    fn check_content(&mut self, _opt: &CheckOptions, rep: &mut VerifyReport) -> FsCheckerResult {
        let chains = collect_chains(self.io, self.layout)?;
        for (id, chain) in &chains {
            let Some(head) = chain.head else {
                continue;
            };
            if !chain.is_complete() || self.layout.validate_record(&head).is_err() {
                continue;
            }
            if self.digest_of(chain, &head)? != head.hash {
                rep.push(Finding::err(
                    "DIGEST",
                    format!("id {id} ({}): digest mismatch", head.name),
                ));
            }
        }
        Ok(())
    }

    fn check_accounting(&mut self, _opt: &CheckOptions, rep: &mut VerifyReport) -> FsCheckerResult {
        let mut fresh = self.layout.clone();
        let stats = fresh.mount(self.io)?;
        let tracked = self.layout.used_bytes();
        if stats.used_bytes != tracked {
            rep.push(Finding::err(
                "ACCOUNT",
                format!("{tracked} bytes tracked as used, scan finds {}", stats.used_bytes),
            ));
        }
        if stats.used_bytes > self.layout.capacity() {
            rep.push(Finding::err(
                "ACCOUNT",
                format!(
                    "{} bytes used exceeds capacity {}",
                    stats.used_bytes,
                    self.layout.capacity()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "std", feature = "chain", feature = "slotted"))]
mod tests {
    use super::*;
    use crate::chain::*;
    use crate::slotted::SlotLayout;

    #[test]
    fn test_clean_store_has_no_errors() {
        let mut buf = vec![0xFFu8; 64 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut fs = FlashFs::mount_chip(&mut io).unwrap();
        fs.write_file("a", &[1; 5000]).unwrap();
        fs.write_file("b", b"short").unwrap();

        let rep = fs.check().unwrap();
        assert!(rep.ok(), "{rep}");
        assert_eq!(rep.count(Severity::Info), 1);
    }

    #[test]
    fn test_detects_orphans_and_purges_them() {
        let mut buf = vec![0xFFu8; 64 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut fs = FlashFs::mount_chip(&mut io).unwrap();
        fs.write_file("big", &[7; 9000]).unwrap();
        fs.write_file("keep", b"x").unwrap();
        // lose the head block of "big", as an aborted replace would
        let io = fs.into_inner();
        io.erase_block(0).unwrap();

        let mut fs = FlashFs::mount_chip(io).unwrap();
        let rep = fs.check().unwrap();
        assert_eq!(rep.with_code("ORPHAN").count(), 1);

        assert_eq!(fs.purge_orphans().unwrap(), vec![1]);
        assert!(fs.check().unwrap().with_code("ORPHAN").next().is_none());
        assert_eq!(fs.get_used(), 4096);
    }

    #[test]
    fn test_detects_digest_mismatch() {
        let mut buf = vec![0xFFu8; 16 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let layout = SlotLayout::for_region(&io, 16 * 1024);
        let mut fs = FlashFs::mount(&mut io, layout).unwrap();
        fs.write_file("cfg", b"abcdef").unwrap();

        let io = fs.into_inner();
        io.program_page(1024, &[0x00]).unwrap();

        let mut fs = FlashFs::mount_region(io, 16 * 1024).unwrap();
        let rep = fs.check().unwrap();
        assert_eq!(rep.with_code("DIGEST").count(), 1);

        let only_records = CheckOptions {
            phases: VerifyPhases::RECORDS,
            fail_fast: false,
        };
        assert!(fs.check_with(&only_records).unwrap().ok());
    }

    #[test]
    fn test_chain_set_completeness() {
        let name = FileName::new("f").unwrap();
        let rec = |index| ChainRecord::new(1, 2, index, 0, &name, 5000, [0; 16]).to_record(0, 0);

        let mut set = ChainSet::default();
        set.chunks.push(rec(1));
        assert!(!set.is_complete());

        set.head = Some(rec(0));
        set.chunks.push(rec(0));
        assert!(set.is_complete());

        set.chunks.push(rec(1));
        assert!(!set.is_complete());
    }
}
