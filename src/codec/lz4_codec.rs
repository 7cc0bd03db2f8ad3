use super::{AlgoId, CompressOutcome, Compressor};
use crate::error::{PcError, Result};

pub struct Lz4Codec;

impl Compressor for Lz4Codec {
    fn algo_id(&self) -> AlgoId {
        AlgoId::Lz4
    }

    fn compress(&self, src: &[u8], _level: u32) -> CompressOutcome {
        let out = lz4_flex::compress(src);
        if out.len() < src.len() {
            CompressOutcome { data: out, compressed: true, chosen: AlgoId::Lz4 }
        } else {
            CompressOutcome { data: src.to_vec(), compressed: false, chosen: AlgoId::Lz4 }
        }
    }

    fn decompress(&self, _chosen: AlgoId, src: &[u8], original_len_hint: usize) -> Result<Vec<u8>> {
        lz4_flex::decompress(src, original_len_hint)
            .map_err(|e| PcError::Format(format!("lz4 decompress: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = Lz4Codec;
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".repeat(10);
        let out = codec.compress(&data, 1);
        assert!(out.compressed);
        let back = codec.decompress(AlgoId::Lz4, &out.data, data.len()).unwrap();
        assert_eq!(back, data);
    }
}
