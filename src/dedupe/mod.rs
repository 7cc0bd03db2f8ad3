//! Dedupe adapter (§4.3): wraps the (out-of-scope) Rabin/fixed deduper
//! internals behind a narrow contract — produce an index array + residual
//! data from a chunk, transpose-and-compress the index, compress the
//! residual with the chunk's main compressor, and invert all of that on
//! decompress.

pub mod fixed;
pub mod index_codec;
pub mod rabin;

use std::collections::HashMap;

use crate::codec::{AlgoId, Compressor};
use crate::error::{PcError, Result};
use crate::preproc::PreprocStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeMode {
    Rabin,
    Fixed,
}

const DUP_BIT: u32 = 0x8000_0000;
const HEADER_LEN: usize = 17;

const RESIDUAL_COMPRESSED: u8 = 0x02;
/// Residual region is a full `PreprocStack` envelope (LZP/Delta-II ahead of
/// the main compressor) rather than a bare main-compressor frame. Set
/// alongside dedupe whenever the archive has preproc enabled too (§4.4:
/// dedupe and preproc are sequential stages, not alternatives).
const RESIDUAL_PREPROC: u8 = 0x04;

/// Cross-chunk state for `-G` global dedupe. Sequential access to this is
/// the caller's responsibility (the `index_sem` chain in the pipeline
/// layer) — this type is not internally synchronized.
#[derive(Default)]
pub struct GlobalIndex {
    seen: HashMap<u64, u32>,
    blocks: Vec<Vec<u8>>,
}

impl GlobalIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DedupeAdapter {
    pub mode: DedupeMode,
    pub block_size: u64,
}

impl DedupeAdapter {
    fn boundaries(&self, data: &[u8]) -> Vec<usize> {
        match self.mode {
            DedupeMode::Rabin => rabin::boundaries(data, self.block_size),
            DedupeMode::Fixed => fixed::boundaries(data, self.block_size),
        }
    }

    /// Builds `[header | index | residual]` from `chunk`, using (and
    /// updating) `global` for duplicate lookups. When `preproc` is enabled,
    /// the residual runs through the LZP/Delta-II stack ahead of the main
    /// compressor instead of being compressed directly (§4.4: dedupe then
    /// preproc+compress are sequential, not mutually exclusive). Returns the
    /// layout bytes plus which concrete sub-algorithm compressed the
    /// residual (relevant for `adapt`/`adapt2`, recorded in the outer chunk
    /// flag's sub-algo bits by the caller).
    pub fn encode(
        &self,
        chunk: &[u8],
        global: &mut GlobalIndex,
        main: &dyn Compressor,
        level: u32,
        preproc: Option<&PreprocStack>,
    ) -> (Vec<u8>, AlgoId) {
        let bounds = self.boundaries(chunk);
        let mut entries: Vec<u8> = Vec::with_capacity(bounds.len() * 4);
        let mut residual: Vec<u8> = Vec::new();
        let mut start = 0usize;

        for end in &bounds {
            let block = &chunk[start..*end];
            let h = xxhash_rust::xxh64::xxh64(block, 0);
            let entry: u32 = if let Some(&id) = global.seen.get(&h) {
                DUP_BIT | id
            } else {
                let id = global.blocks.len() as u32;
                global.seen.insert(h, id);
                global.blocks.push(block.to_vec());
                residual.extend_from_slice(block);
                block.len() as u32
            };
            entries.extend_from_slice(&entry.to_be_bytes());
            start = *end;
        }

        let entry_count = bounds.len();
        let idx = index_codec::compress_index(&entries, entry_count);

        let (residual_bytes, residual_flags, chosen) = match preproc.filter(|p| p.enabled()) {
            Some(preproc) => {
                let (envelope, chosen) = preproc.encode(&residual, level, main);
                (envelope, RESIDUAL_PREPROC, chosen)
            }
            None => {
                let outcome = main.compress(&residual, level);
                if outcome.compressed && outcome.data.len() < residual.len() {
                    (outcome.data, RESIDUAL_COMPRESSED, outcome.chosen)
                } else {
                    (residual.clone(), 0u8, AlgoId::None)
                }
            }
        };

        let mut flags = residual_flags;
        if idx.is_compressed {
            flags |= 0x01;
        }

        let mut out = Vec::with_capacity(HEADER_LEN + idx.bytes.len() + residual_bytes.len());
        out.push(flags);
        out.extend_from_slice(&(entry_count as u32).to_be_bytes());
        out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        out.extend_from_slice(&(idx.bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&(residual.len() as u32).to_be_bytes());
        out.extend_from_slice(&(residual_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&idx.bytes);
        out.extend_from_slice(&residual_bytes);
        (out, chosen)
    }

    /// Inverts `encode`. `global` must be replayed in the same chunk order
    /// used at encode time so duplicate references resolve correctly.
    /// `preproc` must mirror whatever was passed to `encode` for this
    /// archive, since `RESIDUAL_PREPROC` only records *that* the residual is
    /// a preproc envelope, not which stages were active inside it (that's
    /// self-describing in the envelope's own flag byte).
    pub fn decode(
        &self,
        body: &[u8],
        global: &mut GlobalIndex,
        main: &dyn Compressor,
        chosen: AlgoId,
        preproc: Option<&PreprocStack>,
    ) -> Result<Vec<u8>> {
        if body.len() < HEADER_LEN {
            return Err(PcError::Format("dedupe header truncated".into()));
        }
        let flags = body[0];
        let block_count = u32::from_be_bytes(body[1..5].try_into().unwrap()) as usize;
        let index_raw_size = u32::from_be_bytes(body[5..9].try_into().unwrap()) as usize;
        let index_stored_size = u32::from_be_bytes(body[9..13].try_into().unwrap()) as usize;
        let residual_raw_size = u32::from_be_bytes(body[13..17].try_into().unwrap()) as usize;
        let _ = index_raw_size;

        let idx_start = HEADER_LEN;
        let idx_end = idx_start + index_stored_size;
        if idx_end > body.len() {
            return Err(PcError::Format("dedupe index region exceeds body".into()));
        }
        let residual_region = &body[idx_end..];

        let entries = index_codec::decompress_index(&body[idx_start..idx_end], block_count, flags & 0x01 != 0)?;
        let residual = if flags & RESIDUAL_PREPROC != 0 {
            let preproc = preproc.ok_or_else(|| PcError::Format("dedupe residual needs preproc but none configured".into()))?;
            preproc.decode(residual_region, main, chosen, residual_raw_size)?
        } else if flags & RESIDUAL_COMPRESSED != 0 {
            main.decompress(chosen, residual_region, residual_raw_size)?
        } else {
            residual_region.to_vec()
        };

        let mut out = Vec::new();
        let mut cursor = 0usize;
        for i in 0..block_count {
            let entry = u32::from_be_bytes(entries[i * 4..i * 4 + 4].try_into().unwrap());
            if entry & DUP_BIT != 0 {
                let id = (entry & !DUP_BIT) as usize;
                let block = global
                    .blocks
                    .get(id)
                    .ok_or_else(|| PcError::Format("dedupe back-reference out of range".into()))?
                    .clone();
                out.extend_from_slice(&block);
            } else {
                let len = entry as usize;
                if cursor + len > residual.len() {
                    return Err(PcError::Format("dedupe residual region truncated".into()));
                }
                let block = residual[cursor..cursor + len].to_vec();
                cursor += len;
                global.blocks.push(block.clone());
                out.extend_from_slice(&block);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::get_compressor;

    #[test]
    fn round_trips_fixed_mode() {
        let adapter = DedupeAdapter { mode: DedupeMode::Fixed, block_size: 16 };
        let main = get_compressor(AlgoId::Zlib).unwrap();
        let mut enc_global = GlobalIndex::new();
        let chunk = b"ABCDEFGHIJKLMNOP".repeat(8); // identical 16-byte blocks dedupe perfectly
        let (body, chosen) = adapter.encode(&chunk, &mut enc_global, main.as_ref(), 6, None);

        let mut dec_global = GlobalIndex::new();
        let back = adapter.decode(&body, &mut dec_global, main.as_ref(), chosen, None).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn round_trips_rabin_mode_with_varied_content() {
        let adapter = DedupeAdapter { mode: DedupeMode::Rabin, block_size: 32 };
        let main = get_compressor(AlgoId::None).unwrap();
        let mut enc_global = GlobalIndex::new();
        let chunk: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let (body, chosen) = adapter.encode(&chunk, &mut enc_global, main.as_ref(), 1, None);

        let mut dec_global = GlobalIndex::new();
        let back = adapter.decode(&body, &mut dec_global, main.as_ref(), chosen, None).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn round_trips_with_preproc_over_residual() {
        let adapter = DedupeAdapter { mode: DedupeMode::Fixed, block_size: 16 };
        let main = get_compressor(AlgoId::Zlib).unwrap();
        let preproc = crate::preproc::PreprocStack { lzp: true, delta2: true };
        let mut enc_global = GlobalIndex::new();
        // Mix of repeated and unique blocks so both duplicate references and
        // a non-trivial residual (run through preproc) are exercised.
        let mut chunk = b"ABCDEFGHIJKLMNOP".repeat(4);
        chunk.extend(b"the quick brown fox jumps over ".repeat(6));
        let (body, chosen) = adapter.encode(&chunk, &mut enc_global, main.as_ref(), 6, Some(&preproc));

        let mut dec_global = GlobalIndex::new();
        let back = adapter.decode(&body, &mut dec_global, main.as_ref(), chosen, Some(&preproc)).unwrap();
        assert_eq!(back, chunk);
    }
}
