mod capture;
mod cli;
mod dns;
mod engine;
mod report;
mod track;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use capture::{decode_frame, Segment, SnoopReader};
use clap::Parser;
use cli::Args;
use engine::Engine;
use log::{debug, info};

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("dnsbal: {e:#}");
        exit(2);
    }
}

fn run(args: &Args) -> Result<()> {
    let input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };
    let mut reader = SnoopReader::new(BufReader::new(input))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .context("failed to install interrupt handler")?;
    }

    let mut engine = Engine::new(args.filter.clone(), args.track_all);
    let mut records: u64 = 0;
    while !interrupted.load(Ordering::Relaxed) {
        let record = match reader.next_record()? {
            Some(record) => record,
            None => break,
        };
        records += 1;
        engine.tick(record.sec);
        match decode_frame(record.data) {
            Some(Segment::Udp {
                src,
                dst,
                sport,
                dport,
                payload,
            }) => engine.on_udp_segment(src, dst, sport, dport, payload, record.sec),
            Some(Segment::Tcp {
                src,
                dst,
                sport,
                dport,
                flags,
            }) => engine.on_tcp_segment(src, dst, sport, dport, flags),
            None => {}
        }
    }

    if interrupted.load(Ordering::Relaxed) {
        info!("interrupted, reporting partial results");
    }
    debug!("processed {records} capture records");

    report::print_summary(&engine.finalize())
}
