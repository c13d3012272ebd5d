use std::io;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use commit_log::dump_writer;
use commit_log::Config;
use commit_log::Dump;

#[derive(Clone, Debug, PartialEq, Eq, clap::Parser)]
#[clap(about = "dump the segments of a commit log directory", author)]
pub struct Args {
    /// The storage directory of a commit log.
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

fn main() -> Result<(), io::Error> {
    let args = Args::parse();

    let dir = args.path.to_str().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Path is not valid UTF-8: {:?}", args.path),
        )
    })?;

    let config = Arc::new(Config::new(dir));

    let mut w = stdout().lock();
    Dump::new(config).write_with(&mut w, dump_writer::multiline_string)
}
