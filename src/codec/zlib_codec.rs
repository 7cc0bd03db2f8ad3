use std::io::Write;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Read;

use super::{AlgoId, CompressOutcome, Compressor};
use crate::error::{PcError, Result};

pub struct ZlibCodec;

impl Compressor for ZlibCodec {
    fn algo_id(&self) -> AlgoId {
        AlgoId::Zlib
    }

    fn compress(&self, src: &[u8], level: u32) -> CompressOutcome {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
        let compressed = encoder
            .write_all(src)
            .and_then(|_| encoder.finish())
            .ok();
        match compressed {
            Some(data) if data.len() < src.len() => {
                CompressOutcome { data, compressed: true, chosen: AlgoId::Zlib }
            }
            _ => CompressOutcome { data: src.to_vec(), compressed: false, chosen: AlgoId::Zlib },
        }
    }

    fn decompress(&self, _chosen: AlgoId, src: &[u8], original_len_hint: usize) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(src);
        let mut out = Vec::with_capacity(original_len_hint);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| PcError::Format(format!("zlib decompress: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = ZlibCodec;
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(50);
        let out = codec.compress(&data, 6);
        assert!(out.compressed);
        let back = codec.decompress(AlgoId::Zlib, &out.data, data.len()).unwrap();
        assert_eq!(back, data);
    }
}
