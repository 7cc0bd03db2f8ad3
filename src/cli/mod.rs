pub mod args;

use std::path::{Path, PathBuf};

use crate::crypto;
use crate::error::{PcError, Result};
use crate::pipeline::{self, CompressOptions, DecompressOptions};

use args::{Args, Mode};

/// Default compressed-archive extension appended when no explicit output
/// path is given on the compress side (mirrors test scenario 1's `a` ->
/// `a.pz`).
const ARCHIVE_EXT: &str = "pz";

pub fn run(argv: &[String]) -> Result<()> {
    let args = args::parse(argv)?;

    let input = args.input.clone().ok_or_else(|| PcError::Config("missing input filename".into()))?;
    let output = match &args.output {
        Some(p) => p.clone(),
        None => default_output_path(&input, args.mode),
    };

    let password = match &args.password_file {
        Some(path) => Some(crypto::read_and_wipe_password_file(path)?),
        None => None,
    };

    match args.mode {
        Mode::Compress => run_compress(&args, &input, &output, password),
        Mode::Decompress => run_decompress(&args, &input, &output, password),
    }
}

fn run_compress(args: &Args, input: &Path, output: &Path, password: Option<Vec<u8>>) -> Result<()> {
    let input_len = std::fs::metadata(input).map_err(|e| PcError::io(input.display().to_string(), e))?.len();
    if input_len == 0 {
        return Err(PcError::Config(format!("refusing to compress empty input {}", input.display())));
    }

    let opts = CompressOptions {
        algo: args.algo,
        level: args.level,
        chunksize: args.chunksize,
        workers: args.workers,
        cksum: args.cksum,
        preproc: args.preproc,
        dedupe: args.dedupe,
        global_dedupe: args.global_dedupe,
        crypto_algo: args.crypto_algo,
        password,
        key_len: args.key_len,
        disable_rabin_split: args.disable_rabin_split,
    };

    let stats = pipeline::compress_file(input, output, opts)?;

    if args.show_compress_stats {
        let out_len = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        eprintln!(
            "{}: {} -> {} bytes ({:.1}%), {} chunks, avg {} bytes, largest {}, smallest {}",
            input.display(),
            input_len,
            out_len,
            out_len as f64 / input_len as f64 * 100.0,
            stats.chunk_num,
            stats.avg_chunk(),
            stats.largest_chunk,
            stats.smallest_chunk,
        );
    }
    if args.show_alloc_stats {
        // No allocator-slab instrumentation in this build; workers/threads
        // are the only per-run resource this pipeline tracks directly.
        eprintln!("{}: {} worker thread(s)", input.display(), args.workers);
    }
    Ok(())
}

fn run_decompress(args: &Args, input: &Path, output: &Path, password: Option<Vec<u8>>) -> Result<()> {
    let opts = DecompressOptions { workers: args.workers, password };
    pipeline::decompress_file(input, output, opts)
}

fn default_output_path(input: &Path, mode: Mode) -> PathBuf {
    match mode {
        Mode::Compress => {
            let mut s = input.as_os_str().to_owned();
            s.push(".");
            s.push(ARCHIVE_EXT);
            PathBuf::from(s)
        }
        Mode::Decompress => {
            if input.extension().map(|e| e == ARCHIVE_EXT).unwrap_or(false) {
                input.with_extension("")
            } else {
                let mut s = input.as_os_str().to_owned();
                s.push(".out");
                PathBuf::from(s)
            }
        }
    }
}
