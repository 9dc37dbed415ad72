use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum PlatformKind {
    Bluesky,
    Mastodon,
    Nostr,
}

#[derive(Parser, Debug, Default)]
#[command(about = concat!(env!("CARGO_CRATE_NAME"), " - cross-post news to social networks"))]
pub struct Flags {
    /// Load HMNB_* settings from this file before reading the environment
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Run everything except the final post requests
    #[arg(long)]
    pub dry_run: bool,

    /// Only post to these platforms (repeatable)
    #[arg(long = "platform", value_enum)]
    pub platforms: Vec<PlatformKind>,

    /// Directory for the <platform>.json post snapshots
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Flags {
    /// Parse from `std::env::args_os()`, [exit][clap::Error::exit] on error.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Whether `kind` should run. No `--platform` flag means all of them.
    pub fn wants(&self, kind: PlatformKind) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&kind)
    }
}
