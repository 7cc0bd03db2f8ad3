use std::io::Cursor;

use super::{AlgoId, CompressOutcome, Compressor};
use crate::error::{PcError, Result};

pub struct LzmaCodec;

impl Compressor for LzmaCodec {
    fn algo_id(&self) -> AlgoId {
        AlgoId::Lzma
    }

    fn compress(&self, src: &[u8], _level: u32) -> CompressOutcome {
        let mut out = Vec::new();
        let ok = lzma_rs::lzma_compress(&mut Cursor::new(src), &mut out).is_ok();
        if ok && out.len() < src.len() {
            CompressOutcome { data: out, compressed: true, chosen: AlgoId::Lzma }
        } else {
            CompressOutcome { data: src.to_vec(), compressed: false, chosen: AlgoId::Lzma }
        }
    }

    fn decompress(&self, _chosen: AlgoId, src: &[u8], original_len_hint: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(original_len_hint);
        lzma_rs::lzma_decompress(&mut Cursor::new(src), &mut out)
            .map_err(|e| PcError::Format(format!("lzma decompress: {e}")))?;
        Ok(out)
    }
}

/// Compresses a buffer with LZMA only, with no size-comparison fallback —
/// used by the dedupe index codec, which always wants LZMA specifically
/// (§4.3: "Index compression uses LZMA irrespective of the main algorithm").
pub fn compress_raw(src: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    lzma_rs::lzma_compress(&mut Cursor::new(src), &mut out).ok()?;
    Some(out)
}

pub fn decompress_raw(src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    lzma_rs::lzma_decompress(&mut Cursor::new(src), &mut out)
        .map_err(|e| PcError::Format(format!("lzma index decompress: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = LzmaCodec;
        let data = b"repetitive repetitive repetitive data data data".repeat(20);
        let out = codec.compress(&data, 6);
        let back = codec.decompress(AlgoId::Lzma, &out.data, data.len()).unwrap();
        assert_eq!(back, data);
    }
}
