//! Per-chunk digest and file-header integrity algorithms. Out-of-scope per
//! the spec ("the checksum library" is an external collaborator) — this
//! module is the narrow contract that wraps real crates behind one enum so
//! the rest of the pipeline never cares which one is selected.

use crate::config::{BLAKE3_BYTES, CRC32_BYTES, SHA256_BYTES, XXH64_BYTES};
use sha2::Digest as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgo {
    Crc32,
    Blake3,
    Xxh64,
    Sha256,
}

impl ChecksumAlgo {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "crc32" => Some(ChecksumAlgo::Crc32),
            "blake3" => Some(ChecksumAlgo::Blake3),
            "xxh64" => Some(ChecksumAlgo::Xxh64),
            "sha256" => Some(ChecksumAlgo::Sha256),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgo::Crc32 => "crc32",
            ChecksumAlgo::Blake3 => "blake3",
            ChecksumAlgo::Xxh64 => "xxh64",
            ChecksumAlgo::Sha256 => "sha256",
        }
    }

    /// Digest width in bytes. This is `D` in the chunk-frame layout and is
    /// zero in encrypted mode (the digest region is replaced by the HMAC).
    pub fn width(self) -> usize {
        match self {
            ChecksumAlgo::Crc32 => CRC32_BYTES,
            ChecksumAlgo::Blake3 => BLAKE3_BYTES,
            ChecksumAlgo::Xxh64 => XXH64_BYTES,
            ChecksumAlgo::Sha256 => SHA256_BYTES,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            ChecksumAlgo::Crc32 => {
                let mut h = crc32fast::Hasher::new();
                h.update(data);
                h.finalize().to_be_bytes().to_vec()
            }
            ChecksumAlgo::Blake3 => blake3::hash(data).as_bytes().to_vec(),
            ChecksumAlgo::Xxh64 => xxhash_rust::xxh64::xxh64(data, 0).to_be_bytes().to_vec(),
            ChecksumAlgo::Sha256 => sha2::Sha256::digest(data).to_vec(),
        }
    }
}

/// CRC32 used for plaintext-mode framing integrity (header trailer and
/// per-chunk length/digest/flag region). Kept separate from `ChecksumAlgo`
/// because it is always CRC32 regardless of the chosen chunk-digest
/// algorithm — the spec distinguishes "per-chunk digest" (selectable) from
/// "framing CRC32" (fixed).
pub fn crc32(data: &[u8]) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(data);
    h.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_digest_len() {
        for algo in [ChecksumAlgo::Crc32, ChecksumAlgo::Blake3, ChecksumAlgo::Xxh64, ChecksumAlgo::Sha256] {
            assert_eq!(algo.digest(b"hello world").len(), algo.width());
        }
    }

    #[test]
    fn names_round_trip() {
        for algo in [ChecksumAlgo::Crc32, ChecksumAlgo::Blake3, ChecksumAlgo::Xxh64, ChecksumAlgo::Sha256] {
            assert_eq!(ChecksumAlgo::from_name(algo.name()), Some(algo));
        }
    }

    #[test]
    fn crc32_matches_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
