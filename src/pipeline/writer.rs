//! Compress-direction writer (§4.6): single thread, drains worker slots in
//! strict round-robin order (the same order the scheduler dispatched jobs
//! in), writes each frame verbatim, and posts `write_done_sem` so the
//! scheduler can reuse that slot. Stops once every worker has reported its
//! `len_cmp == 0` termination sentinel.

use std::io::Write;
use std::sync::Arc;

use crate::error::Result;

use super::job::WorkerSlot;

#[derive(Debug, Default, Clone, Copy)]
pub struct WriteStats {
    pub chunk_num: u64,
    pub largest_chunk: u64,
    pub smallest_chunk: u64,
    pub total_cmp_bytes: u64,
}

impl WriteStats {
    fn record(&mut self, len: u64) {
        self.chunk_num += 1;
        self.total_cmp_bytes += len;
        self.largest_chunk = self.largest_chunk.max(len);
        self.smallest_chunk = if self.chunk_num == 1 { len } else { self.smallest_chunk.min(len) };
    }

    pub fn avg_chunk(&self) -> u64 {
        if self.chunk_num == 0 { 0 } else { self.total_cmp_bytes / self.chunk_num }
    }
}

/// Drains `slots` in round-robin order, writing each worker's framed output
/// to `out` until every worker has signalled termination. A write error is
/// fatal immediately (§7 kind 4: "can't continue without a sane backing
/// file").
pub fn run(mut out: impl Write, slots: &[Arc<WorkerSlot>]) -> Result<WriteStats> {
    let nworkers = slots.len();
    let mut done = vec![false; nworkers];
    let mut stats = WriteStats::default();
    let mut idx = 0usize;

    while done.iter().any(|d| !d) {
        let slot = &slots[idx];
        if !done[idx] {
            slot.cmp_done_sem.wait();
            if let Some(result) = slot.take_result() {
                if result.len_cmp == 0 {
                    done[idx] = true;
                } else {
                    out.write_all(&result.bytes)
                        .map_err(|e| crate::error::PcError::io("<output>".to_string(), e))?;
                    stats.record(result.bytes.len() as u64);
                }
            } else {
                done[idx] = true;
            }
            slot.write_done_sem.post();
        }
        idx = (idx + 1) % nworkers;
    }

    out.write_all(&0u64.to_be_bytes())
        .map_err(|e| crate::error::PcError::io("<output>".to_string(), e))?;
    out.flush().map_err(|e| crate::error::PcError::io("<output>".to_string(), e))?;

    Ok(stats)
}
