//! Pluggable main-compressor layer. Individual compressors are out-of-scope
//! per the spec ("the individual compressors... are external collaborators")
//! — this module is the narrow `(init, deinit, props, compress, decompress,
//! stats)` contract, collapsed into one `Compressor` trait since this
//! crate's transforms are stateless per call (no persistent `ctx` needed for
//! any backing crate used here).

mod adapt;
mod bzip2_codec;
mod lz4_codec;
pub(crate) mod lzma_codec;
mod none_codec;
mod zlib_codec;

use crate::error::{PcError, Result};

/// 8-byte, NUL-padded, left-justified ASCII algorithm identifier as written
/// to the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgoId {
    None,
    Lz4,
    Zlib,
    Lzma,
    Bzip2,
    Adapt,
    Adapt2,
}

impl AlgoId {
    pub fn name(self) -> &'static str {
        match self {
            AlgoId::None => "none",
            AlgoId::Lz4 => "lz4",
            AlgoId::Zlib => "zlib",
            AlgoId::Lzma => "lzma",
            AlgoId::Bzip2 => "bzip2",
            AlgoId::Adapt => "adapt",
            AlgoId::Adapt2 => "adapt2",
        }
    }

    pub fn from_name(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(AlgoId::None),
            "lz4" => Ok(AlgoId::Lz4),
            "zlib" => Ok(AlgoId::Zlib),
            "lzma" => Ok(AlgoId::Lzma),
            "bzip2" => Ok(AlgoId::Bzip2),
            "adapt" => Ok(AlgoId::Adapt),
            "adapt2" => Ok(AlgoId::Adapt2),
            // Recognized identifiers with no available real backing crate.
            // Never fabricated: fail loudly instead of silently substituting.
            "lzmaMt" | "ppmd" | "lzfx" | "libbsc" => Err(PcError::UnsupportedAlgorithm(s.to_string())),
            other => Err(PcError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Writes this identifier as an 8-byte, NUL-padded field.
    pub fn to_field(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        let bytes = self.name().as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    pub fn from_field(field: &[u8; 8]) -> Result<Self> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(8);
        let name = std::str::from_utf8(&field[..end])
            .map_err(|_| PcError::Format("non-UTF8 algorithm field".into()))?;
        Self::from_name(name)
    }

    /// Which sub-algorithm bucket an adapt mode's flag bits 4-6 refer to.
    pub fn adapt_candidates(self) -> &'static [AlgoId] {
        match self {
            AlgoId::Adapt => &[AlgoId::Bzip2, AlgoId::Lzma],
            AlgoId::Adapt2 => &[AlgoId::Bzip2, AlgoId::Lzma, AlgoId::Zlib],
            _ => &[],
        }
    }

    /// Encodes the 3-bit sub-algorithm id carried in a chunk flag's bits
    /// 4-6, used to record which concrete codec an `adapt`/`adapt2` chunk
    /// (or a dedupe residual, which goes through the same mechanism) was
    /// actually compressed with.
    pub fn to_adapt_id(self) -> u8 {
        match self {
            AlgoId::None => 0,
            AlgoId::Lz4 => 1,
            AlgoId::Zlib => 2,
            AlgoId::Lzma => 3,
            AlgoId::Bzip2 => 4,
            AlgoId::Adapt => 5,
            AlgoId::Adapt2 => 6,
        }
    }

    pub fn from_adapt_id(id: u8) -> Result<AlgoId> {
        match id {
            0 => Ok(AlgoId::None),
            1 => Ok(AlgoId::Lz4),
            2 => Ok(AlgoId::Zlib),
            3 => Ok(AlgoId::Lzma),
            4 => Ok(AlgoId::Bzip2),
            5 => Ok(AlgoId::Adapt),
            6 => Ok(AlgoId::Adapt2),
            other => Err(PcError::Format(format!("unknown adapt sub-algorithm id {other}"))),
        }
    }
}

/// Outcome of a compress attempt: the spec's "compression failure" is not an
/// error, it's a signal to store the body verbatim (§7 kind 6).
pub struct CompressOutcome {
    pub data: Vec<u8>,
    /// `false` when the result was not smaller than the input (or the
    /// backing codec errored) and `data` is the original input returned
    /// unmodified.
    pub compressed: bool,
    /// For `adapt`/`adapt2`: which concrete codec was used, for flag bits 4-6.
    pub chosen: AlgoId,
}

pub trait Compressor: Send + Sync {
    fn algo_id(&self) -> AlgoId;
    fn compress(&self, src: &[u8], level: u32) -> CompressOutcome;
    fn decompress(&self, chosen: AlgoId, src: &[u8], original_len_hint: usize) -> Result<Vec<u8>>;
}

pub fn get_compressor(id: AlgoId) -> Result<Box<dyn Compressor>> {
    match id {
        AlgoId::None => Ok(Box::new(none_codec::NoneCodec)),
        AlgoId::Lz4 => Ok(Box::new(lz4_codec::Lz4Codec)),
        AlgoId::Zlib => Ok(Box::new(zlib_codec::ZlibCodec)),
        AlgoId::Lzma => Ok(Box::new(lzma_codec::LzmaCodec)),
        AlgoId::Bzip2 => Ok(Box::new(bzip2_codec::Bzip2Codec)),
        AlgoId::Adapt | AlgoId::Adapt2 => Ok(Box::new(adapt::AdaptCodec::new(id))),
    }
}
