pub mod chunker;
pub mod pipeline;
pub mod walker;

pub use chunker::{create_chunks, Chunk, WindowSpec};
pub use pipeline::{chunk_document, get_chunks, ChunkingOptions};
