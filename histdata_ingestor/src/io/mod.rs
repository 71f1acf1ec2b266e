//! Byte- and wire-level stages of the pipeline: unpacking downloaded
//! archives and publishing bars to the gateway.

pub mod archive;
pub mod publisher;

pub use archive::{ExtractedTable, ExtractionError, extract_table};
pub use publisher::{ChunkFailure, DEFAULT_CHUNK_SIZE, OhlcChunk, PublishError, PublishReport, publish};
