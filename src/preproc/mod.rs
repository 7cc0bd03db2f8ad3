//! Preprocessor stack: LZP then Delta-II, in that fixed order, ahead of the
//! main compressor. Builds/parses the `PreprocEnvelope` of §4.2/§3.

pub mod delta2;
pub mod lzp;

use crate::codec::{AlgoId, Compressor};
use crate::error::{PcError, Result};

pub const FLAG_DELTA2: u8 = 0x01;
pub const FLAG_LZP: u8 = 0x02;
pub const FLAG_COMPRESSED: u8 = 0x80;
const KNOWN_FLAGS: u8 = FLAG_DELTA2 | FLAG_LZP | FLAG_COMPRESSED;

/// Which optional stages are enabled for this archive (set once from CLI
/// flags `-L`/`-P`, shared by every chunk).
#[derive(Debug, Clone, Copy, Default)]
pub struct PreprocStack {
    pub lzp: bool,
    pub delta2: bool,
}

impl PreprocStack {
    pub fn enabled(&self) -> bool {
        self.lzp || self.delta2
    }

    /// Runs LZP (if enabled) then Delta-II (if enabled) then the main
    /// compressor, and assembles the envelope: `[flag][post-preproc len BE
    /// u64][body]`. Returns `(envelope_bytes, chosen_sub_algo)`.
    pub fn encode(&self, src: &[u8], level: u32, compressor: &dyn Compressor) -> (Vec<u8>, AlgoId) {
        let mut flag = 0u8;
        let mut body: Vec<u8> = src.to_vec();

        if self.lzp {
            if let Some(packed) = lzp::compress(&body) {
                if packed.len() < body.len() {
                    body = packed;
                    flag |= FLAG_LZP;
                }
            }
        }

        if self.delta2 {
            if let Some(packed) = delta2::compress(&body) {
                body = packed;
                flag |= FLAG_DELTA2;
            }
        }

        let post_preproc_len = body.len() as u64;
        let outcome = compressor.compress(&body, level);
        let (final_body, chosen) = if outcome.compressed && outcome.data.len() < body.len() {
            flag |= FLAG_COMPRESSED;
            (outcome.data, outcome.chosen)
        } else {
            (body, AlgoId::None)
        };

        let mut envelope = Vec::with_capacity(9 + final_body.len());
        envelope.push(flag);
        envelope.extend_from_slice(&post_preproc_len.to_be_bytes());
        envelope.extend_from_slice(&final_body);
        (envelope, chosen)
    }

    /// Inverts `encode`: decompress (if `COMPRESSED`), then reverse Delta-II
    /// (if its bit is set), then reverse LZP (if its bit is set).
    pub fn decode(
        &self,
        envelope: &[u8],
        compressor: &dyn Compressor,
        chosen: AlgoId,
        original_len: usize,
    ) -> Result<Vec<u8>> {
        if envelope.len() < 9 {
            return Err(PcError::Format("preproc envelope shorter than header".into()));
        }
        let flag = envelope[0];
        if flag & !KNOWN_FLAGS != 0 {
            return Err(PcError::Format(format!("preproc envelope has unknown flag bits: {flag:#x}")));
        }
        let post_preproc_len = u64::from_be_bytes(envelope[1..9].try_into().unwrap()) as usize;
        let mut body = envelope[9..].to_vec();

        if flag & FLAG_COMPRESSED != 0 {
            body = compressor.decompress(chosen, &body, post_preproc_len)?;
        }
        if flag & FLAG_DELTA2 != 0 {
            body = delta2::decompress(&body);
        }
        if flag & FLAG_LZP != 0 {
            body = lzp::decompress(&body, original_len)
                .ok_or_else(|| PcError::Format("LZP stream corrupt".into()))?;
        }
        Ok(body)
    }
}
