use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use commit_log::CommitLog;
use commit_log::Config;
use commit_log::RecordBatch;

#[derive(Clone, Debug, PartialEq, Eq, clap::Parser)]
#[clap(about = "measure append and read throughput of a commit log", author)]
pub struct Args {
    /// The storage directory; it must not be in use.
    #[arg(value_name = "PATH")]
    dir: PathBuf,

    /// Number of batches to append.
    #[arg(long, default_value_t = 100_000)]
    count: u64,

    /// Size in bytes of the single record in every batch.
    #[arg(long, default_value_t = 100)]
    size: usize,

    /// Maximum number of batches in a segment.
    #[arg(long, default_value_t = 64 * 1024)]
    segment_max_records: usize,

    /// Sync the active segment every N appends; 0 to never sync.
    #[arg(long, default_value_t = 0)]
    sync_every: u64,
}

fn main() -> Result<(), io::Error> {
    let args = Args::parse();

    let dir = args.dir.to_str().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Path is not valid UTF-8: {:?}", args.dir),
        )
    })?;

    let config = Config {
        segment_max_records: Some(args.segment_max_records),
        ..Config::new(dir)
    };

    let log = CommitLog::open(Arc::new(config))?;
    let start_offset = log.next_offset();

    let batch = RecordBatch::from_values([vec![b'x'; args.size]]);

    let start = Instant::now();
    for i in 0..args.count {
        log.append_batch(&batch)?;

        if args.sync_every > 0 && (i + 1) % args.sync_every == 0 {
            log.sync()?;
        }
    }
    log.sync()?;
    report("append", args.count, args.size, start.elapsed());

    let start = Instant::now();
    for offset in start_offset..start_offset + args.count {
        let got = log.read_batch(offset)?;
        if got != batch {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected batch at offset {}", offset),
            ));
        }
    }
    report("read", args.count, args.size, start.elapsed());

    println!("{:#}", log.stat());

    log.close()
}

fn report(op: &str, count: u64, size: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    println!(
        "{}: {} batches in {:?}; {:.0} batches/s; {:.2} MB/s",
        op,
        count,
        elapsed,
        count as f64 / secs,
        (count as f64 * size as f64) / secs / 1024.0 / 1024.0,
    );
}
