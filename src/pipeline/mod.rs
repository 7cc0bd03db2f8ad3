//! Chunked parallel compression pipeline (§4). Wires together the worker
//! pool, the compress-direction scheduler/writer, and the decompress-
//! direction scheduler/writer behind one `compress_file`/`decompress_file`
//! entry point pair.

pub mod context;
pub mod decompress;
pub mod driver;
pub mod job;
pub mod scheduler;
pub mod semaphore;
pub mod worker;
pub mod writer;

pub use driver::{compress_file, decompress_file, CompressOptions, DecompressOptions};
pub use writer::WriteStats;
