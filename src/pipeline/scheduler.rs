//! Compress-direction scheduler (§4.5): reads the input in fixed-size
//! chunks, hands each to the next worker round-robin, and waits on that
//! worker's `write_done_sem` before reusing its slot (bounding memory to
//! roughly `nb_workers * chunksize`).
//!
//! With Rabin splitting enabled (`rabin_split`, the default unless `-r`
//! disables it), a chunk boundary is pulled back to the last Rabin boundary
//! found in the just-read buffer and the trailing bytes carry over to the
//! start of the next read, so identical data realigns to identical chunk
//! boundaries even when shifted in the file.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dedupe::rabin;
use crate::error::Result;

use super::job::{ChunkJob, WorkerSlot};

/// Reads chunks from `reader` and dispatches them round-robin across
/// `slots`. `rabin_split`, when `Some(avg_block_size)`, enables the
/// boundary realignment described above; `None` (either `-r`, or the
/// whole-file single-chunk case) reads plain fixed-size chunks. Returns the
/// total number of chunks dispatched (excluding the final termination
/// signal, which this function also sends).
pub fn run(
    mut reader: impl Read,
    slots: &[Arc<WorkerSlot>],
    chunksize: u64,
    rabin_split: Option<u64>,
    cancelled: &Arc<AtomicBool>,
) -> Result<u64> {
    let nworkers = slots.len();
    let mut chunk_id = 0u64;
    let mut buf = vec![0u8; chunksize as usize];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let carry_len = carry.len();
        buf[..carry_len].copy_from_slice(&carry);
        carry.clear();
        let n = carry_len + read_fully(&mut reader, &mut buf[carry_len..])?;
        if n == 0 {
            break;
        }

        let at_eof = n < buf.len();
        let end = boundary_for(&buf[..n], rabin_split, at_eof);
        if end < n {
            carry = buf[end..n].to_vec();
        }
        let is_last = at_eof && carry.is_empty();

        let worker = &slots[(chunk_id as usize) % nworkers];
        worker.write_done_sem.wait();
        worker.hand_in(ChunkJob::Compress { id: chunk_id, data: buf[..end].to_vec(), is_last });
        chunk_id += 1;
        if is_last {
            break;
        }
    }

    for slot in slots {
        slot.write_done_sem.wait();
        slot.hand_in(ChunkJob::Compress { id: 0, data: Vec::new(), is_last: true });
    }

    Ok(chunk_id)
}

/// Where a just-read buffer should actually end. At EOF (a short read) the
/// whole buffer is the chunk. Otherwise, with Rabin splitting enabled, pull
/// the boundary back to the last in-buffer Rabin edge so the caller can
/// carry the remainder into the next read; falls back to the full buffer
/// when no internal boundary exists.
fn boundary_for(data: &[u8], rabin_split: Option<u64>, at_eof: bool) -> usize {
    if at_eof {
        return data.len();
    }
    match rabin_split.and_then(|avg_block| rabin::last_boundary(data, avg_block)) {
        Some(b) => b,
        None => data.len(),
    }
}

fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(crate::error::PcError::io("<input>".to_string(), e)),
        }
    }
    Ok(total)
}
