//! The buffer-handoff types workers exchange with the scheduler/writer.
//! Ownership transfer happens through `Mutex<Option<T>>` slots rather than a
//! literal raw-pointer swap (§9: "an arena-index abstraction works equally
//! well"), with the semaphore pair around each slot still providing the
//! exact exclusion and ordering guarantees of the original handshake.

use std::sync::Mutex;

use super::semaphore::Semaphore;

/// Work handed from scheduler to worker.
pub enum ChunkJob {
    Compress { id: u64, data: Vec<u8>, is_last: bool },
    Decompress { id: u64, len_cmp: u64, digest: Vec<u8>, mac: Vec<u8>, flags: crate::chunk::ChunkFlags, body: Vec<u8>, original_len: Option<u64> },
}

/// Result handed from worker to writer.
pub struct ChunkResult {
    pub id: u64,
    /// Fully framed bytes ready to write verbatim (compress direction), or
    /// the reconstructed plaintext (decompress direction).
    pub bytes: Vec<u8>,
    /// Zero signals termination, mirroring `len_cmp == 0` in §4.4/§4.6.
    pub len_cmp: u64,
}

pub struct WorkerSlot {
    pub id: usize,
    pub input: Mutex<Option<ChunkJob>>,
    pub output: Mutex<Option<ChunkResult>>,
    pub start_sem: Semaphore,
    pub cmp_done_sem: Semaphore,
    pub write_done_sem: Semaphore,
    pub index_sem: Semaphore,
}

impl WorkerSlot {
    pub fn new(id: usize, pre_post_index: bool) -> Self {
        WorkerSlot {
            id,
            input: Mutex::new(None),
            output: Mutex::new(None),
            start_sem: Semaphore::new(0),
            cmp_done_sem: Semaphore::new(0),
            write_done_sem: Semaphore::new(1),
            index_sem: Semaphore::new(if pre_post_index { 1 } else { 0 }),
        }
    }

    pub fn hand_in(&self, job: ChunkJob) {
        *self.input.lock().unwrap() = Some(job);
        self.start_sem.post();
    }

    pub fn take_job(&self) -> Option<ChunkJob> {
        self.input.lock().unwrap().take()
    }

    pub fn hand_out(&self, result: ChunkResult) {
        *self.output.lock().unwrap() = Some(result);
        self.cmp_done_sem.post();
    }

    pub fn take_result(&self) -> Option<ChunkResult> {
        self.output.lock().unwrap().take()
    }
}
