//! Errors raised by the reader, processor and writer stages.

use thiserror::Error;

use super::reader::PagingStrategy;
use crate::models::PageCursor;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Failed to fetch page at {cursor}: {source}")]
    Fetch {
        cursor: PageCursor,
        #[source]
        source: StoreError,
    },

    /// A checkpoint written under one paging strategy cannot resume another
    #[error("Cursor {cursor} cannot be used with {strategy} paging")]
    CursorMismatch {
        cursor: PageCursor,
        strategy: PagingStrategy,
    },
}

/// Per-item failure; the item is skipped and counted, the run continues
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Member '{member_id}' is missing required field '{field}'")]
    MissingField {
        member_id: String,
        field: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Chunk {sequence} failed to commit: {source}")]
    Commit {
        sequence: u64,
        #[source]
        source: StoreError,
    },
}

impl WriterError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            Self::Commit { source, .. } => source,
        }
    }
}
