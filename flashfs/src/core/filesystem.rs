// SPDX-License-Identifier: MIT

#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::vec::Vec;

use flashio::FlashIO;

use crate::core::cursor::{ScanCursor, find_head_by_id, find_live_head};
use crate::core::errors::*;
use crate::core::fault::{FaultLatch, FaultSink};
use crate::core::layout::FsLayout;
use crate::core::record::*;
use crate::core::utils::checksum_utils::digest;

#[cfg(feature = "alloc")]
use crate::core::checker::{CheckOptions, FsChecker, LayoutChecker, VerifyReport, collect_chains};

/// Runtime knobs of a mounted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsOptions {
    /// Read back every program and fail the write with `VerifyFailed` on mismatch.
    pub verify_writes: bool,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            verify_writes: true,
        }
    }
}

/// Flat file store over one medium and one layout.
///
/// Names map to ids through the live head records found on the medium; the
/// facade keeps no directory cache, so every lookup is a full scan. The medium
/// is borrowed mutably for the lifetime of the instance.
pub struct FlashFs<'a, IO: FlashIO + ?Sized, L: FsLayout> {
    io: &'a mut IO,
    layout: L,
    options: FsOptions,
    last_id: FileId,
    faults: Option<&'a mut (dyn FaultSink + 'a)>,
    latch: FaultLatch,
}

impl<'a, IO: FlashIO + ?Sized, L: FsLayout> FlashFs<'a, IO, L> {
    /// Scans the medium once to seed the id counter and the space accounting.
    pub fn mount(io: &'a mut IO, layout: L) -> FsResult<Self> {
        Self::mount_with(io, layout, FsOptions::default())
    }

    pub fn mount_with(io: &'a mut IO, mut layout: L, options: FsOptions) -> FsResult<Self> {
        let stats = layout.mount(&mut *io)?;
        log::info!(
            "mounted {} store: {} of {} bytes used, {} records, last id {}",
            layout.identifier(),
            stats.used_bytes,
            layout.capacity(),
            stats.records,
            stats.last_id
        );
        Ok(Self {
            io,
            layout,
            options,
            last_id: stats.last_id,
            faults: None,
            latch: FaultLatch::default(),
        })
    }

    /// Routes fault transitions to `sink`.
    pub fn with_fault_sink(mut self, sink: &'a mut (dyn FaultSink + 'a)) -> Self {
        self.faults = Some(sink);
        self
    }

    #[inline]
    pub fn options(&self) -> FsOptions {
        self.options
    }

    #[inline]
    pub fn set_options(&mut self, options: FsOptions) {
        self.options = options;
    }

    #[inline]
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Highest id handed out or seen on the medium.
    #[inline]
    pub fn last_id(&self) -> FileId {
        self.last_id
    }

    /// Gives the medium back.
    pub fn into_inner(self) -> &'a mut IO {
        self.io
    }

    fn next_id(&mut self) -> FsResult<FileId> {
        let id = self
            .last_id
            .checked_add(1)
            .ok_or(FsError::Other("file id space exhausted"))?;
        self.last_id = id;
        Ok(id)
    }

    /// Stores `data` under `name`, replacing any live file of that name, and
    /// returns the new id.
    ///
    /// Space is checked before anything is deleted, so a write refused with
    /// `Full` leaves the old generation intact. A write failing midway is not
    /// rolled back.
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> FsResult<FileId> {
        let result = self.write_inner(name, data);
        match &result {
            Ok(_) => self.latch.clear_all(self.faults.as_deref_mut()),
            Err(e) => {
                if let Some(kind) = e.fault_kind() {
                    self.latch.raise(kind, self.faults.as_deref_mut());
                }
            }
        }
        result
    }

    fn write_inner(&mut self, name: &str, data: &[u8]) -> FsResult<FileId> {
        let name = FileName::new(name)?;
        crate::ensure!(
            u32::try_from(data.len()).is_ok(),
            FsAllocatorError::Full
        );
        let len = data.len() as u32;

        let previous = find_live_head(&mut *self.io, &self.layout, &name)?;
        self.layout
            .reserve(&mut *self.io, len, previous.map(|rec| rec.file_id))?;
        self.remove_generations(&name)?;

        let file_id = self.next_id()?;
        let req = WriteRequest {
            name,
            data,
            file_id,
            hash: digest(data),
            verify: self.options.verify_writes,
        };
        self.layout.write_file(&mut *self.io, &req)?;
        log::debug!("wrote {name} as id={file_id} ({len} bytes)");
        Ok(file_id)
    }

    /// Deletes every live generation of `name`; returns how many ids went.
    fn remove_generations(&mut self, name: &FileName) -> FsResult<u32> {
        let mut removed = 0;
        while let Some(head) = find_live_head(&mut *self.io, &self.layout, name)? {
            if self.layout.remove(&mut *self.io, head.file_id)? == 0 {
                break;
            }
            removed += 1;
        }
        Ok(removed)
    }

    /// Live head record behind `file`.
    fn resolve(&mut self, file: FileRef<'_>) -> FsResult<FileRecord> {
        let head = match file {
            FileRef::Id(0) => return Err(FsReaderError::InvalidFileId.into()),
            FileRef::Id(id) => find_head_by_id(&mut *self.io, &self.layout, id)?,
            FileRef::Name(name) => match FileName::new(name) {
                Ok(name) => find_live_head(&mut *self.io, &self.layout, &name)?,
                // a name that cannot be stored cannot be found
                Err(_) => None,
            },
        };
        head.ok_or(FsReaderError::FileNotFound.into())
    }

    /// Reads a file into `out` and checks its digest; returns the length.
    pub fn read_file<'n>(&mut self, file: impl Into<FileRef<'n>>, out: &mut [u8]) -> FsResult<usize> {
        let head = self.resolve(file.into())?;
        self.read_head(&head, out)
    }

    fn read_head(&mut self, head: &FileRecord, out: &mut [u8]) -> FsResult<usize> {
        let len = self.layout.read_file(&mut *self.io, head, out)?;
        if digest(&out[..len]) != head.hash {
            log::warn!("id={} ({}): digest mismatch", head.file_id, head.name);
            return Err(FsReaderError::FileCorrupt.into());
        }
        Ok(len)
    }

    /// Id of the live file named `name`. Names that could never be stored
    /// resolve to `None`.
    pub fn search(&mut self, name: &str) -> FsResult<Option<FileId>> {
        Ok(self.stat(name)?.map(|rec| rec.file_id))
    }

    /// Head record of the live file named `name`: id, length, chunk count.
    pub fn stat(&mut self, name: &str) -> FsResult<Option<FileRecord>> {
        let Ok(name) = FileName::new(name) else {
            return Ok(None);
        };
        Ok(find_live_head(&mut *self.io, &self.layout, &name)?)
    }

    /// Deletes every record of `id`; unknown ids and id 0 are a no-op.
    pub fn remove(&mut self, id: FileId) -> FsResult<u32> {
        if id == 0 {
            return Ok(0);
        }
        Ok(self.layout.remove(&mut *self.io, id)?)
    }

    /// Deletes every live generation of `name`; `false` when none existed.
    pub fn remove_by_name(&mut self, name: &str) -> FsResult<bool> {
        let Ok(name) = FileName::new(name) else {
            return Ok(false);
        };
        Ok(self.remove_generations(&name)? > 0)
    }

    #[inline]
    pub fn get_capacity(&self) -> u32 {
        self.layout.capacity()
    }

    #[inline]
    pub fn get_used(&self) -> u32 {
        self.layout.used_bytes()
    }

    #[inline]
    pub fn get_free(&self) -> u32 {
        self.get_capacity().saturating_sub(self.get_used())
    }

    /// Live files, in medium order.
    pub fn files(&mut self) -> FileIter<'_, IO, L> {
        FileIter {
            io: &mut *self.io,
            layout: &self.layout,
            cursor: ScanCursor::new(),
        }
    }

    /// Wipes every file. The id counter keeps counting up.
    pub fn format(&mut self) -> FsResult {
        self.layout.format(&mut *self.io)?;
        log::info!("{} store formatted", self.layout.identifier());
        Ok(())
    }

    /// Returns space held by deleted records to the free pool, where the
    /// layout needs an explicit erase for that.
    pub fn reclaim(&mut self) -> FsResult<u32> {
        Ok(self.layout.reclaim(&mut *self.io)?)
    }
}

#[cfg(feature = "alloc")]
impl<'a, IO: FlashIO + ?Sized, L: FsLayout> FlashFs<'a, IO, L> {
    /// Reads a whole file into a new buffer sized from its head record.
    pub fn read_to_vec<'n>(&mut self, file: impl Into<FileRef<'n>>) -> FsResult<Vec<u8>> {
        let head = self.resolve(file.into())?;
        let mut out = vec![0u8; head.total_length as usize];
        let len = self.read_head(&head, &mut out)?;
        out.truncate(len);
        Ok(out)
    }

    /// Deletes chains left behind by aborted writes: chunks with no head, or
    /// chains missing chunks. Returns the ids removed.
    pub fn purge_orphans(&mut self) -> FsResult<Vec<FileId>> {
        let chains = collect_chains(&mut *self.io, &self.layout)?;
        let mut purged = Vec::new();
        for (id, chain) in chains {
            if chain.is_complete() {
                continue;
            }
            log::warn!(
                "purging orphaned chain id={id}: {} chunk(s), head {}",
                chain.chunks.len(),
                if chain.head.is_some() { "present" } else { "missing" }
            );
            self.layout.remove(&mut *self.io, id)?;
            purged.push(id);
        }
        Ok(purged)
    }

    pub fn check(&mut self) -> FsCheckerResult<VerifyReport> {
        LayoutChecker::new(&mut *self.io, &self.layout).check_all()
    }

    pub fn check_with(&mut self, options: &CheckOptions) -> FsCheckerResult<VerifyReport> {
        LayoutChecker::new(&mut *self.io, &self.layout).check_with(options)
    }
}

/// Iterator over live head records, see [`FlashFs::files`].
pub struct FileIter<'f, IO: FlashIO + ?Sized, L: FsLayout> {
    io: &'f mut IO,
    layout: &'f L,
    cursor: ScanCursor,
}

impl<IO: FlashIO + ?Sized, L: FsLayout> Iterator for FileIter<'_, IO, L> {
    type Item = FsResult<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.cursor.next_with(self.io, self.layout)? {
                Ok(ScanSlot {
                    record: Some(rec), ..
                }) if rec.is_live() && rec.is_head() => return Some(Ok(rec)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[cfg(all(test, feature = "std", feature = "chain", feature = "slotted"))]
mod tests {
    use super::*;
    use crate::chain::ChainLayout;
    use crate::core::fault::FaultKind;
    use crate::slotted::SlotLayout;
    use flashio::prelude::*;

    #[derive(Default)]
    struct Recorder(Vec<(FaultKind, bool)>);

    impl FaultSink for Recorder {
        fn report(&mut self, kind: FaultKind, active: bool) {
            self.0.push((kind, active));
        }
    }

    #[test]
    fn test_replace_keeps_one_generation() {
        let mut buf = vec![0xFFu8; 64 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut fs = FlashFs::mount_chip(&mut io).unwrap();

        let first = fs.write_file("cfg", b"v1").unwrap();
        let second = fs.write_file("cfg", b"version 2").unwrap();
        assert!(second > first);
        assert_eq!(fs.search("cfg").unwrap(), Some(second));
        assert_eq!(fs.files().count(), 1);

        let mut out = [0u8; 32];
        assert_eq!(
            fs.read_file(first, &mut out),
            Err(FsError::Reader(FsReaderError::FileNotFound))
        );
        let len = fs.read_file("cfg", &mut out).unwrap();
        assert_eq!(&out[..len], b"version 2");
    }

    #[test]
    fn test_lookup_errors() {
        let mut buf = vec![0xFFu8; 16 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut fs = FlashFs::mount_region(&mut io, 16 * 1024).unwrap();
        fs.write_file("a", b"abc").unwrap();

        let mut out = [0u8; 2];
        assert_eq!(
            fs.read_file(0u32, &mut out).map_err(|e| e.kind()),
            Err(FsErrorKind::InvalidFileId)
        );
        assert_eq!(
            fs.read_file("nope", &mut out).map_err(|e| e.kind()),
            Err(FsErrorKind::FileNotFound)
        );
        assert_eq!(
            fs.read_file("a", &mut out).map_err(|e| e.kind()),
            Err(FsErrorKind::BufferTooSmall)
        );
        assert_eq!(fs.search("").unwrap(), None);
        assert_eq!(fs.remove(0).unwrap(), 0);
        assert!(!fs.remove_by_name("nope").unwrap());
        assert_eq!(
            fs.write_file("", b"x").map_err(|e| e.kind()),
            Err(FsErrorKind::InvalidName)
        );
    }

    #[test]
    fn test_full_write_keeps_old_generation() {
        let mut buf = vec![0xFFu8; 16 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let mut fs = FlashFs::mount_chip(&mut io).unwrap();

        let id = fs.write_file("log", &[1; 3000]).unwrap();
        fs.write_file("other", &[2; 3 * 3840]).unwrap();
        assert_eq!(
            fs.write_file("log", &[3; 2 * 3840]).map_err(|e| e.kind()),
            Err(FsErrorKind::Full)
        );
        assert_eq!(fs.search("log").unwrap(), Some(id));
        assert_eq!(fs.get_free() + fs.get_used(), fs.get_capacity());
    }

    #[test]
    fn test_fault_sink_transitions() {
        let mut sink = Recorder::default();
        let mut buf = vec![0xFFu8; 8 * 1024];
        let mut io = MemFlash::new(&mut buf);
        let layout = SlotLayout::for_region(&io, 8 * 1024);
        let mut fs = FlashFs::mount(&mut io, layout)
            .unwrap()
            .with_fault_sink(&mut sink);

        assert!(fs.write_file("big", &[0; 4000]).is_err());
        assert!(fs.write_file("big", &[0; 4000]).is_err());
        fs.write_file("small", b"ok").unwrap();
        fs.write_file("small", b"ok").unwrap();
        drop(fs);

        assert_eq!(sink.0, vec![(FaultKind::Full, true), (FaultKind::Full, false)]);
    }

    #[test]
    fn test_ids_survive_remount() {
        let mut buf = vec![0xFFu8; 32 * 1024];
        {
            let mut io = MemFlash::new(&mut buf);
            let layout = ChainLayout::probe(&mut io).unwrap();
            let mut fs = FlashFs::mount(&mut io, layout).unwrap();
            fs.write_file("a", b"1").unwrap();
            fs.write_file("b", b"2").unwrap();
            fs.remove_by_name("b").unwrap();
        }
        let mut io = MemFlash::new(&mut buf);
        let mut fs = FlashFs::mount_chip(&mut io).unwrap();
        // the erased id 2 is forgotten on the chained layout
        assert_eq!(fs.last_id(), 1);
        assert_eq!(fs.write_file("c", b"3").unwrap(), 2);
        assert_eq!(fs.read_to_vec("a").unwrap(), b"1");
    }

    #[test]
    fn test_reclaimed_slotted_ids_keep_counting_in_session() {
        let mut buf = vec![0xFFu8; 8 * 1024];
        {
            let mut io = MemFlash::new(&mut buf);
            let mut fs = FlashFs::mount_region(&mut io, 8 * 1024).unwrap();
            let first = fs.write_file("a", b"1").unwrap();
            assert!(fs.remove_by_name("a").unwrap());
            assert_eq!(fs.reclaim().unwrap(), 1);
            let second = fs.write_file("b", b"2").unwrap();
            assert!(second > first);
            assert_eq!(fs.last_id(), second);
        }
        let mut io = MemFlash::new(&mut buf);
        let fs = FlashFs::mount_region(&mut io, 8 * 1024).unwrap();
        assert_eq!(fs.last_id(), 2);
    }
}
