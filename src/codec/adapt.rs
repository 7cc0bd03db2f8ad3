use super::{get_compressor, AlgoId, CompressOutcome, Compressor};
use crate::error::{PcError, Result};

/// `adapt`/`adapt2`: tries every candidate codec for this chunk and keeps the
/// smallest result, recording the winner in the chunk flag's sub-algorithm
/// bits (4-6) via `CompressOutcome::chosen`.
pub struct AdaptCodec {
    id: AlgoId,
}

impl AdaptCodec {
    pub fn new(id: AlgoId) -> Self {
        AdaptCodec { id }
    }
}

impl Compressor for AdaptCodec {
    fn algo_id(&self) -> AlgoId {
        self.id
    }

    fn compress(&self, src: &[u8], level: u32) -> CompressOutcome {
        let mut best: Option<CompressOutcome> = None;
        for &candidate in self.id.adapt_candidates() {
            let Ok(codec) = get_compressor(candidate) else { continue };
            let attempt = codec.compress(src, level);
            let better = match &best {
                None => true,
                Some(current) => attempt.compressed && attempt.data.len() < current.data.len(),
            };
            if better {
                best = Some(CompressOutcome { data: attempt.data, compressed: attempt.compressed, chosen: candidate });
            }
        }
        best.unwrap_or_else(|| CompressOutcome { data: src.to_vec(), compressed: false, chosen: AlgoId::None })
    }

    fn decompress(&self, chosen: AlgoId, src: &[u8], original_len_hint: usize) -> Result<Vec<u8>> {
        if chosen == AlgoId::None {
            return Ok(src.to_vec());
        }
        if !self.id.adapt_candidates().contains(&chosen) {
            return Err(PcError::Format(format!(
                "adapt chunk records sub-algorithm {:?} not valid for {:?}",
                chosen, self.id
            )));
        }
        get_compressor(chosen)?.decompress(chosen, src, original_len_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_a_real_candidate_and_round_trips() {
        let codec = AdaptCodec::new(AlgoId::Adapt2);
        let data = b"lots of repeated structure here ".repeat(40);
        let out = codec.compress(&data, 6);
        assert!(out.compressed);
        assert_ne!(out.chosen, AlgoId::None);
        let back = codec.decompress(out.chosen, &out.data, data.len()).unwrap();
        assert_eq!(back, data);
    }
}
