//! Index array compression: a 4-byte-entry matrix transpose (to cluster
//! same-significance bytes together) followed by LZMA, always LZMA
//! regardless of the chunk's main algorithm (§4.3). Falls back to verbatim
//! storage whenever LZMA doesn't strictly shrink the transposed index, or
//! the index is tiny — this resolves Open Question (a).

use crate::codec::lzma_codec;
use crate::config::MIN_INDEX_COMPRESS_SIZE;
use crate::error::{PcError, Result};

const ENTRY_SIZE: usize = 4;

/// Transposes `n` four-byte entries: byte-position `k` of every entry is
/// gathered contiguously. Its own inverse when called again with the same
/// entry count (transpose-of-transpose on a rectangular layout needs the
/// original row count, supplied here as `entry_count`).
pub fn transpose(entries: &[u8], entry_count: usize) -> Vec<u8> {
    debug_assert_eq!(entries.len(), entry_count * ENTRY_SIZE);
    let mut out = vec![0u8; entries.len()];
    for col in 0..ENTRY_SIZE {
        for row in 0..entry_count {
            out[col * entry_count + row] = entries[row * ENTRY_SIZE + col];
        }
    }
    out
}

pub fn untranspose(transposed: &[u8], entry_count: usize) -> Vec<u8> {
    debug_assert_eq!(transposed.len(), entry_count * ENTRY_SIZE);
    let mut out = vec![0u8; transposed.len()];
    for col in 0..ENTRY_SIZE {
        for row in 0..entry_count {
            out[row * ENTRY_SIZE + col] = transposed[col * entry_count + row];
        }
    }
    out
}

/// Result of compressing the transposed index: either the LZMA-compressed
/// bytes, or the transposed bytes verbatim if LZMA didn't help.
pub struct CompressedIndex {
    pub bytes: Vec<u8>,
    pub is_compressed: bool,
}

pub fn compress_index(entries: &[u8], entry_count: usize) -> CompressedIndex {
    let transposed = transpose(entries, entry_count);
    if transposed.len() < MIN_INDEX_COMPRESS_SIZE {
        return CompressedIndex { bytes: transposed, is_compressed: false };
    }
    match lzma_codec::compress_raw(&transposed) {
        Some(packed) if packed.len() < transposed.len() => {
            CompressedIndex { bytes: packed, is_compressed: true }
        }
        _ => CompressedIndex { bytes: transposed, is_compressed: false },
    }
}

pub fn decompress_index(bytes: &[u8], entry_count: usize, is_compressed: bool) -> Result<Vec<u8>> {
    let transposed = if is_compressed {
        lzma_codec::decompress_raw(bytes)?
    } else {
        bytes.to_vec()
    };
    if transposed.len() != entry_count * ENTRY_SIZE {
        return Err(PcError::Format("dedupe index size mismatch after decompression".into()));
    }
    Ok(untranspose(&transposed, entry_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_is_invertible() {
        let entries: Vec<u8> = (0..40u8).collect(); // 10 entries of 4 bytes
        let t = transpose(&entries, 10);
        let back = untranspose(&t, 10);
        assert_eq!(back, entries);
    }

    #[test]
    fn small_index_stays_verbatim() {
        let entries = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let c = compress_index(&entries, 2);
        assert!(!c.is_compressed);
        let back = decompress_index(&c.bytes, 2, c.is_compressed).unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn large_repetitive_index_round_trips() {
        let entries: Vec<u8> = std::iter::repeat([0u8, 0, 0, 1]).take(100).flatten().collect();
        let c = compress_index(&entries, 100);
        let back = decompress_index(&c.bytes, 100, c.is_compressed).unwrap();
        assert_eq!(back, entries);
    }
}
