//! # Chunk-Oriented Batch Pipeline
//!
//! Reader, processor and writer stages plus the executor that drives them.
//!
//! - [`reader::MemberReader`] - paged read of qualifying members
//! - [`processor::MemberProcessor`] - member to activity transformation
//! - [`writer::ChunkWriter`] - fixed-size buffer committed atomically per chunk
//! - [`chunk_executor::ChunkExecutor`] - the run loop and its status transitions

pub mod chunk_executor;
pub mod errors;
pub mod processor;
pub mod reader;
pub mod writer;

pub use chunk_executor::ChunkExecutor;
pub use errors::{ProcessorError, ReaderError, WriterError};
pub use processor::MemberProcessor;
pub use reader::{MemberReader, Page, PagingStrategy};
pub use writer::{ChunkWriter, FlushContext};
