use std::fmt;
use std::mem;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::errors::WriterError;
use crate::models::{Activity, ExecutionCounters, PageCursor};
use crate::store::{ChunkCommit, ChunkSink};

/// Bookkeeping that travels with a chunk into its commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushContext {
    pub job_execution_id: Uuid,
    pub step_execution_id: Uuid,
    pub sequence: u64,
    /// Read, filter and skip deltas since the previous commit. The write
    /// delta is filled in from the buffer.
    pub contribution: ExecutionCounters,
    pub checkpoint: PageCursor,
}

/// Buffers activities and hands each full chunk to the sink as one commit
pub struct ChunkWriter {
    sink: Arc<dyn ChunkSink>,
    chunk_size: usize,
    buffer: Vec<Activity>,
}

impl fmt::Debug for ChunkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkWriter")
            .field("chunk_size", &self.chunk_size)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl ChunkWriter {
    pub fn new(sink: Arc<dyn ChunkSink>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            sink,
            chunk_size,
            buffer: Vec::with_capacity(chunk_size),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn add(&mut self, activity: Activity) {
        self.buffer.push(activity);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.chunk_size
    }

    /// Drop buffered activities that were never committed
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Commit the buffer as one chunk and return the number of activities
    /// written.
    ///
    /// The buffer is emptied whether or not the commit succeeds; a failed
    /// chunk is never retried by the writer.
    pub async fn flush(&mut self, ctx: FlushContext) -> Result<usize, WriterError> {
        let items = mem::take(&mut self.buffer);
        let written = items.len();

        let mut contribution = ctx.contribution;
        contribution.write_count = written as u64;
        contribution.commit_count = 0;

        let commit = ChunkCommit {
            job_execution_id: ctx.job_execution_id,
            step_execution_id: ctx.step_execution_id,
            sequence: ctx.sequence,
            items,
            contribution,
            checkpoint: ctx.checkpoint,
        };

        self.sink
            .commit_chunk(&commit)
            .await
            .map_err(|source| WriterError::Commit {
                sequence: ctx.sequence,
                source,
            })?;

        debug!(
            job_execution_id = %commit.job_execution_id,
            sequence = commit.sequence,
            written,
            checkpoint = %commit.checkpoint,
            "Chunk committed"
        );

        Ok(written)
    }
}
