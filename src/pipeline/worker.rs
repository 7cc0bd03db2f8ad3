//! Worker stage (§4.4): one thread per compression slot, looping on its
//! `start_sem`, doing the compress-or-decompress work for one chunk, and
//! posting `cmp_done_sem` for the writer.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::chunk::{self, ChunkFlags};
use crate::codec::AlgoId;
use crate::dedupe::GlobalIndex;

use super::context::PipelineContext;
use super::job::{ChunkJob, ChunkResult, WorkerSlot};

pub fn run_compress_worker(
    ctx: Arc<PipelineContext>,
    slots: Arc<Vec<Arc<WorkerSlot>>>,
    my_idx: usize,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
) {
    let slot = Arc::clone(&slots[my_idx]);
    let next = Arc::clone(&slots[(my_idx + 1) % slots.len()]);
    let mut local_index = GlobalIndex::new();
    loop {
        slot.start_sem.wait();
        if cancelled.load(Ordering::SeqCst) || ctx.is_cancelled() {
            slot.hand_out(ChunkResult { id: 0, bytes: Vec::new(), len_cmp: 0 });
            return;
        }
        let Some(ChunkJob::Compress { id, data, is_last }) = slot.take_job() else {
            slot.hand_out(ChunkResult { id: 0, bytes: Vec::new(), len_cmp: 0 });
            return;
        };
        if data.is_empty() {
            slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
            continue;
        }

        let rbytes = data.len();
        let raw_digest = if ctx.crypto_enabled() { Vec::new() } else { ctx.cksum.digest(&data) };

        let mut flags = ChunkFlags::default();
        let (mut body, chosen) = if let Some(dedupe) = &ctx.dedupe {
            flags = flags.with_deduped(true);
            // Dedupe and preproc are sequential stages, not alternatives
            // (§4.4): when both are enabled, preproc+compress runs over the
            // dedupe residual rather than the main compressor running alone.
            let residual_preproc = ctx.preproc.enabled().then_some(&ctx.preproc);
            if residual_preproc.is_some() {
                flags = flags.with_preproc(true);
            }
            if let Some(global) = &ctx.global_index {
                slot.index_sem.wait();
                let mut g = global.lock().unwrap();
                let result = dedupe.encode(&data, &mut g, ctx.compressor.as_ref(), ctx.level, residual_preproc);
                drop(g);
                result
            } else {
                dedupe.encode(&data, &mut local_index, ctx.compressor.as_ref(), ctx.level, residual_preproc)
            }
        } else if ctx.preproc.enabled() {
            flags = flags.with_preproc(true);
            ctx.preproc.encode(&data, ctx.level, ctx.compressor.as_ref())
        } else {
            let outcome = ctx.compressor.compress(&data, ctx.level);
            if outcome.compressed {
                (outcome.data, outcome.chosen)
            } else {
                (outcome.data, AlgoId::None)
            }
        };

        if body.len() >= rbytes {
            body = data.clone();
            flags = flags.with_compressed(false).with_deduped(false).with_preproc(false);
        } else {
            flags = flags.with_compressed(true).with_adapt_id(chosen.to_adapt_id());
        }
        let mut len_cmp = body.len() as u64;

        // Not just the final chunk: a Rabin-split boundary (§4.5) can also
        // truncate a non-last chunk short of `chunksize`, and decode needs
        // the exact original length whenever that happens.
        if rbytes < ctx.chunksize as usize {
            flags = flags.with_chsize(true);
        }

        if let (Some(algo), Some(key)) = (ctx.crypto_algo, ctx.key.as_ref()) {
            let nonce = chunk_nonce(ctx.nonce.as_deref().unwrap_or(&[]), id);
            if let Err(_e) = crate::crypto::crypt_in_place(algo, key, &nonce, &mut body) {
                ctx.mark_errored();
                slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
                continue;
            }
        }

        let digest_width = ctx.chunk_digest_width();
        let mac_width = ctx.chunk_mac_width();
        let mut frame = chunk::build_header_skeleton(len_cmp, digest_width, mac_width, flags);
        if digest_width > 0 {
            frame[8..8 + digest_width].copy_from_slice(&raw_digest);
        }
        frame.extend_from_slice(&body);
        if flags.chsize() {
            frame.extend_from_slice(&(rbytes as u64).to_be_bytes());
        }

        let mac_start = 8 + digest_width;
        if ctx.crypto_enabled() {
            let key = ctx.key.as_ref().unwrap();
            let mac = crate::crypto::hmac(key, &frame);
            frame[mac_start..mac_start + mac_width].copy_from_slice(&mac);
        } else {
            let crc = crate::checksum::crc32(&frame);
            frame[mac_start..mac_start + mac_width].copy_from_slice(&crc.to_be_bytes());
        }

        if ctx.global_index.is_some() {
            next.index_sem.post();
        }

        len_cmp = len_cmp.max(1); // 0 is reserved for the termination sentinel
        slot.hand_out(ChunkResult { id, bytes: frame, len_cmp });
    }
}

pub fn run_decompress_worker(
    ctx: Arc<PipelineContext>,
    slots: Arc<Vec<Arc<WorkerSlot>>>,
    my_idx: usize,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
) {
    let slot = Arc::clone(&slots[my_idx]);
    let next = Arc::clone(&slots[(my_idx + 1) % slots.len()]);
    let mut local_index = GlobalIndex::new();
    loop {
        slot.start_sem.wait();
        if cancelled.load(Ordering::SeqCst) || ctx.is_cancelled() {
            slot.hand_out(ChunkResult { id: 0, bytes: Vec::new(), len_cmp: 0 });
            return;
        }
        let Some(job) = slot.take_job() else {
            slot.hand_out(ChunkResult { id: 0, bytes: Vec::new(), len_cmp: 0 });
            return;
        };
        let ChunkJob::Decompress { id, len_cmp, digest, mac, flags, body, original_len } = job else {
            unreachable!("decompress worker only receives Decompress jobs")
        };

        if mac.is_empty() && body.is_empty() {
            // Termination sentinel dispatched once the archive's chunk
            // stream is exhausted; no frame to verify.
            slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
            continue;
        }

        let digest_width = digest.len();
        let mac_width = mac.len();
        let mut frame_for_mac = chunk::build_header_skeleton(len_cmp, digest_width, mac_width, flags);
        if digest_width > 0 {
            frame_for_mac[8..8 + digest_width].copy_from_slice(&digest);
        }
        frame_for_mac.extend_from_slice(&body);
        if let Some(orig) = original_len {
            frame_for_mac.extend_from_slice(&orig.to_be_bytes());
        }

        let ok = if ctx.crypto_enabled() {
            let key = ctx.key.as_ref().unwrap();
            crate::crypto::verify_hmac(key, &frame_for_mac, &mac)
        } else {
            crate::checksum::crc32(&frame_for_mac).to_be_bytes() == mac.as_slice()
        };
        if !ok {
            ctx.mark_errored();
            slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
            continue;
        }

        let mut body = body;
        if let (Some(algo), Some(key)) = (ctx.crypto_algo, ctx.key.as_ref()) {
            let nonce = chunk_nonce(ctx.nonce.as_deref().unwrap_or(&[]), id);
            if crate::crypto::crypt_in_place(algo, key, &nonce, &mut body).is_err() {
                ctx.mark_errored();
                slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
                continue;
            }
        }

        let original_len_hint = original_len.unwrap_or(ctx.chunksize) as usize;
        let chosen = match AlgoId::from_adapt_id(flags.adapt_id()) {
            Ok(a) => a,
            Err(_) => {
                ctx.mark_errored();
                slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
                continue;
            }
        };

        let plaintext = if flags.deduped() {
            let dedupe = ctx.dedupe.as_ref().expect("deduped flag implies dedupe adapter configured");
            let residual_preproc = flags.preproc().then_some(&ctx.preproc);
            let result = if let Some(global) = &ctx.global_index {
                slot.index_sem.wait();
                let mut g = global.lock().unwrap();
                let r = dedupe.decode(&body, &mut g, ctx.compressor.as_ref(), chosen, residual_preproc);
                drop(g);
                next.index_sem.post();
                r
            } else {
                dedupe.decode(&body, &mut local_index, ctx.compressor.as_ref(), chosen, residual_preproc)
            };
            result
        } else if flags.preproc() {
            ctx.preproc.decode(&body, ctx.compressor.as_ref(), chosen, original_len_hint)
        } else if flags.compressed() {
            ctx.compressor.decompress(chosen, &body, original_len_hint)
        } else {
            Ok(body.clone())
        };

        let plaintext = match plaintext {
            Ok(p) => p,
            Err(e) => {
                ctx.mark_errored();
                let _ = e;
                slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
                continue;
            }
        };

        if !ctx.crypto_enabled() {
            let recomputed = ctx.cksum.digest(&plaintext);
            if recomputed != digest {
                ctx.mark_errored();
                slot.hand_out(ChunkResult { id, bytes: Vec::new(), len_cmp: 0 });
                continue;
            }
        }

        let out_len = plaintext.len() as u64;
        slot.hand_out(ChunkResult { id, bytes: plaintext, len_cmp: out_len.max(1) });
    }
}

/// Derives a per-chunk nonce from the archive-wide base nonce by XORing the
/// chunk id into the trailing bytes, so CTR-mode keystreams never repeat
/// across chunks under the same key.
fn chunk_nonce(base: &[u8], chunk_id: u64) -> Vec<u8> {
    let mut nonce = base.to_vec();
    let id_bytes = chunk_id.to_be_bytes();
    let n = nonce.len();
    for (i, b) in id_bytes.iter().enumerate() {
        if i < n {
            nonce[n - 1 - i] ^= b;
        }
    }
    nonce
}
