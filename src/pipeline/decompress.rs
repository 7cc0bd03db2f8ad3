//! Decompress-direction scheduler + writer (§4.7). Symmetric to
//! `scheduler.rs`/`writer.rs`: a single thread reads chunk frames off the
//! archive sequentially (only one thread may own the read cursor), dispatches
//! `Decompress` jobs round-robin, then drains results in the same order and
//! writes reconstructed plaintext to the output file.
//!
//! Global dedupe's replay needs every earlier chunk's plaintext as potential
//! match material. Rather than re-opening the target file for a second read
//! handle (as the original pipeline's two-file-descriptor approach does),
//! `GlobalIndex` here keeps every distinct block already observed in memory
//! (`dedupe::GlobalIndex::blocks`) and workers consult it directly under the
//! `index_sem` chain — correct for the same reason the original's re-read
//! works (blocks are visited in the same order on both passes) and avoids a
//! second open file descriptor per archive.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chunk;
use crate::error::{PcError, Result};
use crate::pipeline::context::PipelineContext;

use super::job::{ChunkJob, WorkerSlot};

pub fn run(
    mut reader: impl Read,
    mut out: impl Write,
    slots: &[Arc<WorkerSlot>],
    ctx: &PipelineContext,
    cancelled: &Arc<AtomicBool>,
) -> Result<u64> {
    let nworkers = slots.len();
    let digest_width = ctx.chunk_digest_width();
    let mac_width = ctx.chunk_mac_width();
    let header_len = chunk::header_len(digest_width, mac_width);

    let mut chunk_id = 0u64;
    let mut idx = 0usize;
    let mut done = vec![false; nworkers];

    loop {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let mut len_buf = [0u8; 8];
        if !read_exact_or_eof(&mut reader, &mut len_buf)? {
            break;
        }
        let len_opt = chunk::read_length(&len_buf, ctx.chunksize)?;
        let Some(len_cmp) = len_opt else { break };

        let mut rest = vec![0u8; header_len - 8];
        read_exact(&mut reader, &mut rest)?;
        let mut frame_header = len_buf.to_vec();
        frame_header.extend_from_slice(&rest);
        let parsed = chunk::parse_header(&frame_header, digest_width, mac_width)?;

        let has_chsize = parsed.flags.chsize();
        let mut body = vec![0u8; len_cmp as usize];
        read_exact(&mut reader, &mut body)?;
        let original_len = if has_chsize {
            let mut obuf = [0u8; 8];
            read_exact(&mut reader, &mut obuf)?;
            Some(u64::from_be_bytes(obuf))
        } else {
            None
        };

        let worker = &slots[idx % nworkers];
        worker.write_done_sem.wait();
        worker.hand_in(ChunkJob::Decompress {
            id: chunk_id,
            len_cmp,
            digest: parsed.digest,
            mac: parsed.mac,
            flags: parsed.flags,
            body,
            original_len,
        });
        chunk_id += 1;
        idx += 1;
    }

    for slot in slots {
        slot.write_done_sem.wait();
        slot.hand_in(ChunkJob::Decompress {
            id: 0,
            len_cmp: 0,
            digest: Vec::new(),
            mac: Vec::new(),
            flags: Default::default(),
            body: Vec::new(),
            original_len: None,
        });
    }

    let mut widx = 0usize;
    let mut written = 0u64;
    while done.iter().any(|d| !d) {
        let slot = &slots[widx];
        if !done[widx] {
            slot.cmp_done_sem.wait();
            if let Some(result) = slot.take_result() {
                if result.len_cmp == 0 && result.bytes.is_empty() {
                    done[widx] = true;
                } else if ctx.is_errored() {
                    done[widx] = true;
                } else {
                    out.write_all(&result.bytes)
                        .map_err(|e| PcError::io("<output>".to_string(), e))?;
                    written += result.bytes.len() as u64;
                }
            } else {
                done[widx] = true;
            }
            slot.write_done_sem.post();
        }
        widx = (widx + 1) % nworkers;
    }

    if ctx.is_errored() {
        return Err(PcError::Decompression { chunk_id, reason: "chunk verification failed".into() });
    }

    out.flush().map_err(|e| PcError::io("<output>".to_string(), e))?;
    Ok(written)
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|e| PcError::io("<input>".to_string(), e))
}

/// Reads exactly `buf.len()` bytes, returning `Ok(false)` on a clean EOF at
/// the very first byte (the expected way an archive without a trailer would
/// end, and the border case covered by §8) and an error on a short read
/// partway through (a genuinely truncated archive).
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                if total == 0 {
                    return Ok(false);
                }
                return Err(PcError::Format("archive truncated mid chunk-length field".into()));
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PcError::io("<input>".to_string(), e)),
        }
    }
    Ok(true)
}
