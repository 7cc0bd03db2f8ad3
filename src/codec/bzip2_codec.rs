use std::io::Write;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::Read;

use super::{AlgoId, CompressOutcome, Compressor};
use crate::error::{PcError, Result};

pub struct Bzip2Codec;

impl Compressor for Bzip2Codec {
    fn algo_id(&self) -> AlgoId {
        AlgoId::Bzip2
    }

    fn compress(&self, src: &[u8], level: u32) -> CompressOutcome {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
        let compressed = encoder.write_all(src).and_then(|_| encoder.finish()).ok();
        match compressed {
            Some(data) if data.len() < src.len() => {
                CompressOutcome { data, compressed: true, chosen: AlgoId::Bzip2 }
            }
            _ => CompressOutcome { data: src.to_vec(), compressed: false, chosen: AlgoId::Bzip2 },
        }
    }

    fn decompress(&self, _chosen: AlgoId, src: &[u8], original_len_hint: usize) -> Result<Vec<u8>> {
        let mut decoder = BzDecoder::new(src);
        let mut out = Vec::with_capacity(original_len_hint);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| PcError::Format(format!("bzip2 decompress: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = Bzip2Codec;
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(50);
        let out = codec.compress(&data, 6);
        assert!(out.compressed);
        let back = codec.decompress(AlgoId::Bzip2, &out.data, data.len()).unwrap();
        assert_eq!(back, data);
    }
}
