//! Command-line argument parsing. Short, single-dash flags only (no long-
//! option forms), parsed with the same explicit byte-by-byte walk the
//! teacher's `cli/args.rs` uses for its aggregated short-flag handling,
//! simplified here since none of this tool's flags aggregate.

use std::path::PathBuf;

use crate::checksum::ChecksumAlgo;
use crate::codec::AlgoId;
use crate::config;
use crate::crypto::CryptoAlgo;
use crate::dedupe::DedupeMode;
use crate::error::{PcError, Result};
use crate::preproc::PreprocStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Decompress,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub mode: Mode,
    pub algo: AlgoId,
    pub chunksize: u64,
    pub level: u32,
    pub dedupe: Option<(DedupeMode, u64)>,
    pub global_dedupe: bool,
    pub rabin_delta: u8,
    pub disable_rabin_split: bool,
    pub preproc: PreprocStack,
    pub cksum: ChecksumAlgo,
    pub crypto_algo: Option<CryptoAlgo>,
    pub password_file: Option<PathBuf>,
    pub key_len: u32,
    pub workers: u32,
    pub pipe_mode: bool,
    pub show_alloc_stats: bool,
    pub show_compress_stats: bool,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            mode: Mode::Compress,
            algo: AlgoId::Lz4,
            chunksize: config::DEFAULT_CHUNK_SIZE,
            level: 6,
            dedupe: None,
            global_dedupe: false,
            rabin_delta: 0,
            disable_rabin_split: false,
            preproc: PreprocStack::default(),
            cksum: ChecksumAlgo::Crc32,
            crypto_algo: None,
            password_file: None,
            key_len: 16,
            workers: config::NB_WORKERS_DEFAULT,
            pipe_mode: false,
            show_alloc_stats: false,
            show_compress_stats: false,
            input: None,
            output: None,
        }
    }
}

pub fn parse(argv: &[String]) -> Result<Args> {
    let mut args = Args::default();
    let mut mode_set = false;
    let mut fixed_dedupe = false;
    let mut rabin_dedupe = false;
    let mut positionals: Vec<String> = Vec::new();

    let mut i = 0usize;
    while i < argv.len() {
        let arg = &argv[i];
        if !arg.starts_with('-') || arg == "-" {
            positionals.push(arg.clone());
            i += 1;
            continue;
        }

        match arg.as_str() {
            "-c" => {
                let value = next_value(argv, &mut i, "-c")?;
                args.algo = AlgoId::from_name(&value)?;
                args.mode = Mode::Compress;
                mode_set = true;
            }
            "-d" => {
                args.mode = Mode::Decompress;
                mode_set = true;
            }
            "-s" => {
                let value = next_value(argv, &mut i, "-s")?;
                args.chunksize = parse_size(&value)?;
            }
            "-l" => {
                let value = next_value(argv, &mut i, "-l")?;
                let level: u32 = value.parse().map_err(|_| PcError::Config(format!("-l: not a number: {value}")))?;
                if level > config::MAX_LEVEL {
                    return Err(PcError::Config(format!("-l: level {level} exceeds maximum {}", config::MAX_LEVEL)));
                }
                args.level = level;
            }
            "-B" => {
                let value = next_value(argv, &mut i, "-B")?;
                let idx: usize = value.parse().map_err(|_| PcError::Config(format!("-B: not a number: {value}")))?;
                if idx == 0 || idx > config::DEDUPE_BLOCK_SIZES.len() {
                    return Err(PcError::Config(format!("-B: must be in 1..{}", config::DEDUPE_BLOCK_SIZES.len())));
                }
                let block_size = config::DEDUPE_BLOCK_SIZES[idx - 1];
                let mode = if fixed_dedupe { DedupeMode::Fixed } else { DedupeMode::Rabin };
                args.dedupe = Some((mode, block_size));
            }
            "-t" => {
                let value = next_value(argv, &mut i, "-t")?;
                let workers: u32 = value.parse().map_err(|_| PcError::Config(format!("-t: not a number: {value}")))?;
                if workers == 0 || workers > config::NB_WORKERS_MAX {
                    return Err(PcError::Config(format!("-t: must be in 1..={}", config::NB_WORKERS_MAX)));
                }
                args.workers = workers;
            }
            "-p" => args.pipe_mode = true,
            "-D" => {
                rabin_dedupe = true;
                if let Some((_, block_size)) = args.dedupe {
                    args.dedupe = Some((DedupeMode::Rabin, block_size));
                } else {
                    args.dedupe = Some((DedupeMode::Rabin, config::DEDUPE_BLOCK_SIZES[0]));
                }
            }
            "-G" => args.global_dedupe = true,
            "-F" => {
                fixed_dedupe = true;
                if let Some((_, block_size)) = args.dedupe {
                    args.dedupe = Some((DedupeMode::Fixed, block_size));
                } else {
                    args.dedupe = Some((DedupeMode::Fixed, config::DEDUPE_BLOCK_SIZES[0]));
                }
            }
            "-E" => {
                // "-E" implies "-D": similarity-delta matching only makes
                // sense on top of Rabin dedupe, never fixed-size blocks.
                args.rabin_delta = args.rabin_delta.saturating_add(1);
                if !fixed_dedupe {
                    rabin_dedupe = true;
                    if let Some((_, block_size)) = args.dedupe {
                        args.dedupe = Some((DedupeMode::Rabin, block_size));
                    } else {
                        args.dedupe = Some((DedupeMode::Rabin, config::DEDUPE_BLOCK_SIZES[0]));
                    }
                }
            }
            "-r" => args.disable_rabin_split = true,
            "-L" => args.preproc.lzp = true,
            "-P" => args.preproc.delta2 = true,
            "-S" => {
                let value = next_value(argv, &mut i, "-S")?;
                args.cksum = ChecksumAlgo::from_name(&value)
                    .ok_or_else(|| PcError::Config(format!("-S: unknown checksum: {value}")))?;
            }
            "-e" => {
                let value = next_value(argv, &mut i, "-e")?;
                args.crypto_algo = Some(
                    CryptoAlgo::from_name(&value).ok_or_else(|| PcError::Config(format!("-e: unknown cipher: {value}")))?,
                );
            }
            "-w" => {
                let value = next_value(argv, &mut i, "-w")?;
                args.password_file = Some(PathBuf::from(value));
            }
            "-k" => {
                let value = next_value(argv, &mut i, "-k")?;
                let key_len: u32 = value.parse().map_err(|_| PcError::Config(format!("-k: not a number: {value}")))?;
                if key_len != 16 && key_len != 32 {
                    return Err(PcError::Config("-k: key length must be 16 or 32".into()));
                }
                args.key_len = key_len;
            }
            "-M" => args.show_alloc_stats = true,
            "-C" => args.show_compress_stats = true,
            other => return Err(PcError::Config(format!("unknown option: {other}"))),
        }
        i += 1;
    }

    if !mode_set {
        return Err(PcError::Config("must specify -c <algo> or -d".into()));
    }
    if fixed_dedupe && rabin_dedupe {
        return Err(PcError::Config("-F and -D are mutually exclusive".into()));
    }
    if args.global_dedupe && args.pipe_mode {
        return Err(PcError::Config("-G (global dedupe) is incompatible with -p (pipe mode)".into()));
    }
    if args.crypto_algo.is_some() && args.pipe_mode && args.password_file.is_none() {
        return Err(PcError::Config("-p with encryption requires -w <password file>".into()));
    }

    args.input = positionals.first().map(PathBuf::from);
    args.output = positionals.get(1).map(PathBuf::from);

    Ok(args)
}

fn next_value(argv: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    argv.get(*i).cloned().ok_or_else(|| PcError::Config(format!("{flag}: missing argument")))
}

/// Parses a size with an optional `k`/`m`/`g` suffix (case-insensitive),
/// e.g. `5m` -> 5 * 1024 * 1024.
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let (digits, mult) = match s.chars().last() {
        Some(c) if c.eq_ignore_ascii_case(&'k') => (&s[..s.len() - 1], 1024u64),
        Some(c) if c.eq_ignore_ascii_case(&'m') => (&s[..s.len() - 1], 1024 * 1024),
        Some(c) if c.eq_ignore_ascii_case(&'g') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    let value: u64 = digits.parse().map_err(|_| PcError::Config(format!("-s: invalid size: {s}")))?;
    Ok(value * mult)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(argv: &[&str]) -> Result<Args> {
        parse(&argv.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn compress_minimal() {
        let args = a(&["-c", "lz4", "input.txt"]).unwrap();
        assert_eq!(args.mode, Mode::Compress);
        assert_eq!(args.algo, AlgoId::Lz4);
        assert_eq!(args.input.as_deref(), Some(std::path::Path::new("input.txt")));
    }

    #[test]
    fn chunk_size_suffix() {
        let args = a(&["-c", "lz4", "-s", "5m", "in"]).unwrap();
        assert_eq!(args.chunksize, 5 * 1024 * 1024);
    }

    #[test]
    fn dedupe_block_selector() {
        let args = a(&["-c", "none", "-D", "-B", "2", "in"]).unwrap();
        assert_eq!(args.dedupe, Some((DedupeMode::Rabin, config::DEDUPE_BLOCK_SIZES[1])));
    }

    #[test]
    fn fixed_and_rabin_dedupe_conflict() {
        assert!(a(&["-c", "lz4", "-F", "-D", "in"]).is_err());
    }

    #[test]
    fn similarity_delta_flag_implies_rabin_dedupe() {
        let args = a(&["-c", "lz4", "-E", "in"]).unwrap();
        assert_eq!(args.rabin_delta, 1);
        assert_eq!(args.dedupe, Some((DedupeMode::Rabin, config::DEDUPE_BLOCK_SIZES[0])));
    }

    #[test]
    fn similarity_delta_flag_does_not_override_explicit_fixed_mode() {
        let args = a(&["-c", "lz4", "-F", "-E", "in"]).unwrap();
        assert_eq!(args.dedupe, Some((DedupeMode::Fixed, config::DEDUPE_BLOCK_SIZES[0])));
    }

    #[test]
    fn global_dedupe_with_pipe_mode_is_rejected() {
        assert!(a(&["-c", "lz4", "-G", "-p", "in"]).is_err());
    }

    #[test]
    fn missing_mode_is_an_error() {
        assert!(a(&["in"]).is_err());
    }

    #[test]
    fn encryption_in_pipe_mode_requires_password_file() {
        assert!(a(&["-c", "lz4", "-p", "-e", "AES", "in"]).is_err());
        assert!(a(&["-c", "lz4", "-p", "-e", "AES", "-w", "pw.txt", "in"]).is_ok());
    }
}
