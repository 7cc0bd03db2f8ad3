use super::{AlgoId, CompressOutcome, Compressor};
use crate::error::Result;

pub struct NoneCodec;

impl Compressor for NoneCodec {
    fn algo_id(&self) -> AlgoId {
        AlgoId::None
    }

    fn compress(&self, src: &[u8], _level: u32) -> CompressOutcome {
        CompressOutcome { data: src.to_vec(), compressed: false, chosen: AlgoId::None }
    }

    fn decompress(&self, _chosen: AlgoId, src: &[u8], _original_len_hint: usize) -> Result<Vec<u8>> {
        Ok(src.to_vec())
    }
}
