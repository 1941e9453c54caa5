use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dnsbal")]
#[command(about = "Reconstruct DNS-directed backend traffic from a snoop capture", long_about = None)]
pub struct Args {
    /// Snoop capture file to read; stdin when omitted
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Only track DNS queries whose name contains this substring
    #[arg(short = 'F', long)]
    pub filter: Option<String>,

    /// Track every TCP flow instead of only pure SYNs
    #[arg(long)]
    pub track_all: bool,

    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}
