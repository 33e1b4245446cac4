// SPDX-License-Identifier: MIT

mod commands;
mod image;
mod utils;

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Command;
use crate::image::{Backend, Image};
use crate::utils::LogLevel;

#[derive(Parser)]
#[command(name = "flashgen", version, about = "Flash store image tool", long_about = None)]
struct Cli {
    /// Flash image file
    #[arg(short, long, default_value = "flash.img")]
    image: PathBuf,

    /// Store layout on the image
    #[arg(short, long, value_enum, default_value_t = Backend::Chain)]
    backend: Backend,

    /// Slotted region length from the start of the image, e.g. 16K
    #[arg(short, long)]
    region: Option<String>,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    utils::set_log_level(if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    });

    let region = cli.region.as_deref().map(utils::parse_size).transpose()?;

    let mut image = match &cli.command {
        Command::Format {
            capacity: Some(capacity),
        } => Image::create(&cli.image, utils::parse_size(capacity)?)?,
        _ => Image::open(&cli.image)?,
    };
    if let Some(region) = region
        && region > image.capacity()
    {
        anyhow::bail!(
            "Region of {} does not fit the {} image",
            utils::pretty_bytes(region as u64),
            utils::pretty_bytes(image.capacity() as u64)
        );
    }

    image.run(cli.backend, region, &cli.command)
}
