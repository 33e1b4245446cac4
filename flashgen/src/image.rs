// SPDX-License-Identifier: MIT

use std::fs::{File, OpenOptions};
use std::path::Path;

use clap::ValueEnum;
use flashfs::FlashFs;
use flashfs::chain::ChainLayout;
use flashfs::slotted::SlotLayout;
use flashio::prelude::*;

use crate::commands::Command;
use crate::utils;

pub const BLOCK_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Chunked chains over a whole SPI NOR chip
    Chain,
    /// Slotted directory over an internal flash region
    Slotted,
}

/// Flash image file plus the store parameters it was opened with.
pub struct Image {
    file: File,
    capacity: u32,
}

impl Image {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let capacity = u32::try_from(len)
            .map_err(|_| anyhow::anyhow!("Image '{}' is larger than 4 GiB", path.display()))?;
        if capacity == 0 || capacity % BLOCK_SIZE != 0 {
            anyhow::bail!(
                "Image '{}' is {} bytes, not a whole number of {} byte blocks",
                path.display(),
                len,
                BLOCK_SIZE
            );
        }
        crate::log_verbose!("opened {} ({})", path.display(), utils::pretty_bytes(len));
        Ok(Self { file, capacity })
    }

    /// Creates (or truncates) an image of `capacity` bytes, all erased.
    pub fn create(path: &Path, capacity: u32) -> anyhow::Result<Self> {
        if capacity == 0 || capacity % BLOCK_SIZE != 0 {
            anyhow::bail!("Capacity must be a non-zero multiple of {BLOCK_SIZE} bytes");
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;
        StdFlash::new(&mut file, FlashGeometry::nor(capacity))
            .erase_all()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        crate::log_info!(
            "created {} ({})",
            path.display(),
            utils::pretty_bytes(capacity as u64)
        );
        Ok(Self { file, capacity })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Mounts the store and runs `cmd` against it.
    pub fn run(&mut self, backend: Backend, region: Option<u32>, cmd: &Command) -> anyhow::Result<()> {
        let geometry = FlashGeometry::nor(self.capacity);
        let mut io = StdFlash::new(&mut self.file, geometry);

        match backend {
            Backend::Chain => {
                if region.is_some() {
                    crate::log_info!("--region is ignored by the chain backend");
                }
                let layout = ChainLayout::probe(&mut io).map_err(|e| anyhow::anyhow!("{}", e))?;
                let mut fs = FlashFs::mount(&mut io, layout).map_err(|e| anyhow::anyhow!("{}", e))?;
                cmd.execute(&mut fs)
            }
            Backend::Slotted => {
                let region = region.unwrap_or(self.capacity);
                let layout = SlotLayout::for_region(&io, region);
                let mut fs = FlashFs::mount(&mut io, layout).map_err(|e| anyhow::anyhow!("{}", e))?;
                cmd.execute(&mut fs)
            }
        }
    }
}
