// SPDX-License-Identifier: MIT

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use colored::Colorize;
use flashfs::core::checker::{Severity, VerifyReport};
use flashfs::{FlashFs, FsLayout};
use flashio::FlashIO;

use crate::utils;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Erase the store (creates the image when --capacity is given)
    Format {
        /// Image size, e.g. 64K or 16M
        #[arg(short, long)]
        capacity: Option<String>,
    },
    /// Store a host file
    Put {
        /// Host file to store
        src: PathBuf,
        /// Name on flash (defaults to the host file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Copy a file out of the store
    Get {
        name: String,
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List live files
    Ls,
    /// Delete a file
    Rm { name: String },
    /// Show space usage
    Df,
    /// Verify store integrity
    Check {
        /// Erase orphaned chains and reclaim dead blocks first
        #[arg(long)]
        purge: bool,
    },
}

fn fs_err(e: impl core::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("{}", e)
}

impl Command {
    pub fn execute<IO: FlashIO + ?Sized, L: FsLayout>(
        &self,
        fs: &mut FlashFs<'_, IO, L>,
    ) -> anyhow::Result<()> {
        match self {
            Command::Format { .. } => format_store(fs),
            Command::Put { src, name } => put(fs, src, name.as_deref()),
            Command::Get { name, output } => get(fs, name, output.as_deref()),
            Command::Ls => ls(fs),
            Command::Rm { name } => rm(fs, name),
            Command::Df => df(fs),
            Command::Check { purge } => check(fs, *purge),
        }
    }
}

fn format_store<IO: FlashIO + ?Sized, L: FsLayout>(fs: &mut FlashFs<'_, IO, L>) -> anyhow::Result<()> {
    fs.format().map_err(fs_err)?;
    crate::log_info!(
        "{} store formatted, {} free",
        fs.layout().identifier(),
        utils::pretty_bytes(fs.get_free() as u64)
    );
    Ok(())
}

fn put<IO: FlashIO + ?Sized, L: FsLayout>(
    fs: &mut FlashFs<'_, IO, L>,
    src: &Path,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let name = match name {
        Some(n) => n.to_string(),
        None => src
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow::anyhow!("Cannot derive a name from '{}'", src.display()))?
            .to_string(),
    };
    let data = std::fs::read(src)?;
    let id = fs.write_file(&name, &data).map_err(fs_err)?;
    crate::log_info!(
        "{} {} as id {} ({})",
        "stored".green(),
        name,
        id,
        utils::pretty_bytes(data.len() as u64)
    );
    Ok(())
}

fn get<IO: FlashIO + ?Sized, L: FsLayout>(
    fs: &mut FlashFs<'_, IO, L>,
    name: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let data = fs.read_to_vec(name).map_err(fs_err)?;
    match output {
        Some(path) => {
            std::fs::write(path, &data)?;
            crate::log_verbose!("{} -> {} ({} bytes)", name, path.display(), data.len());
        }
        None => std::io::stdout().write_all(&data)?,
    }
    Ok(())
}

fn ls<IO: FlashIO + ?Sized, L: FsLayout>(fs: &mut FlashFs<'_, IO, L>) -> anyhow::Result<()> {
    println!("{:>8} {:>10} {:>6}  {}", "ID", "SIZE", "CHUNKS", "NAME");
    let mut count = 0usize;
    for rec in fs.files() {
        let rec = rec.map_err(fs_err)?;
        println!(
            "{:>8} {:>10} {:>6}  {}",
            rec.file_id,
            utils::sep_u64(rec.total_length as u64),
            rec.chunk_count,
            rec.name
        );
        count += 1;
    }
    crate::log_verbose!("{count} file(s)");
    Ok(())
}

fn rm<IO: FlashIO + ?Sized, L: FsLayout>(fs: &mut FlashFs<'_, IO, L>, name: &str) -> anyhow::Result<()> {
    if !fs.remove_by_name(name).map_err(fs_err)? {
        anyhow::bail!("No such file '{name}'");
    }
    crate::log_info!("{} {}", "removed".yellow(), name);
    Ok(())
}

fn df<IO: FlashIO + ?Sized, L: FsLayout>(fs: &mut FlashFs<'_, IO, L>) -> anyhow::Result<()> {
    let capacity = fs.get_capacity() as u64;
    let used = fs.get_used() as u64;
    let pct = if capacity == 0 { 0.0 } else { used as f64 * 100.0 / capacity as f64 };
    println!("layout   {}", fs.layout().identifier());
    println!("capacity {}", utils::pretty_bytes(capacity));
    println!("used     {} ({pct:.1}%)", utils::pretty_bytes(used));
    println!("free     {}", utils::pretty_bytes(fs.get_free() as u64));
    Ok(())
}

fn check<IO: FlashIO + ?Sized, L: FsLayout>(
    fs: &mut FlashFs<'_, IO, L>,
    purge: bool,
) -> anyhow::Result<()> {
    if purge {
        let purged = fs.purge_orphans().map_err(fs_err)?;
        for id in &purged {
            crate::log_info!("purged orphaned chain id {id}");
        }
        let reclaimed = fs.reclaim().map_err(fs_err)?;
        if reclaimed > 0 {
            crate::log_info!("reclaimed {reclaimed} block(s)");
        }
    }

    let report = fs.check().map_err(fs_err)?;
    print_report(&report);
    if report.has_error() {
        anyhow::bail!(
            "Store check failed: {}",
            report.first_error().unwrap_or("unknown error")
        );
    }
    crate::log_info!("{}", "store OK".green());
    Ok(())
}

fn print_report(report: &VerifyReport) {
    let verbose = utils::log_level() == utils::LogLevel::Verbose;
    for f in &report.findings {
        let tag = match f.sev {
            Severity::Info if !verbose => continue,
            Severity::Info => "INFO".normal(),
            Severity::Warn => "WARN".yellow(),
            Severity::Error => "ERR ".red().bold(),
        };
        println!("{tag}: {:<10} {}", f.code, f.msg);
    }
}
