//! Shared, immutable-after-init pipeline configuration (§9: "global mutable
//! state... becomes a PipelineContext passed by reference").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::checksum::ChecksumAlgo;
use crate::codec::{get_compressor, AlgoId, Compressor};
use crate::crypto::CryptoAlgo;
use crate::dedupe::{DedupeAdapter, GlobalIndex};
use crate::preproc::PreprocStack;

pub struct PipelineContext {
    pub algo: AlgoId,
    pub compressor: Box<dyn Compressor>,
    pub level: u32,
    pub chunksize: u64,
    pub cksum: ChecksumAlgo,
    pub preproc: PreprocStack,
    pub dedupe: Option<DedupeAdapter>,
    pub global_index: Option<Mutex<GlobalIndex>>,
    pub crypto_algo: Option<CryptoAlgo>,
    pub key: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
    cancel: AtomicBool,
    errored: AtomicBool,
}

impl PipelineContext {
    pub fn new(
        algo: AlgoId,
        level: u32,
        chunksize: u64,
        cksum: ChecksumAlgo,
        preproc: PreprocStack,
        dedupe: Option<DedupeAdapter>,
        global_dedupe: bool,
        crypto_algo: Option<CryptoAlgo>,
        key: Option<Vec<u8>>,
        nonce: Option<Vec<u8>>,
    ) -> crate::error::Result<Self> {
        Ok(PipelineContext {
            compressor: get_compressor(algo)?,
            algo,
            level,
            chunksize,
            cksum,
            preproc,
            global_index: if dedupe.is_some() && global_dedupe { Some(Mutex::new(GlobalIndex::new())) } else { None },
            dedupe,
            crypto_algo,
            key,
            nonce,
            cancel: AtomicBool::new(false),
            errored: AtomicBool::new(false),
        })
    }

    pub fn crypto_enabled(&self) -> bool {
        self.crypto_algo.is_some()
    }

    /// Width of the per-chunk digest field: zero when crypto is enabled,
    /// since the HMAC alone authenticates the frame (mirrors `ArchiveHeader`'s
    /// own digest/mac width rule for the file-level trailer).
    pub fn chunk_digest_width(&self) -> usize {
        if self.crypto_enabled() { 0 } else { self.cksum.width() }
    }

    pub fn chunk_mac_width(&self) -> usize {
        if self.crypto_enabled() { crate::config::MAC_BYTES } else { crate::config::CRC32_BYTES as usize }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn mark_errored(&self) {
        self.errored.store(true, Ordering::SeqCst);
        self.cancel();
    }

    pub fn is_errored(&self) -> bool {
        self.errored.load(Ordering::SeqCst)
    }
}
