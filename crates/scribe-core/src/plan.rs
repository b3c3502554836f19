use std::fmt;

use crate::errors::PlanError;

/// Chunk size used for new jobs unless configured otherwise (512 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Number of chunks fetched and transcribed concurrently per invocation.
pub const DEFAULT_PARALLELISM: usize = 5;

/// Inclusive byte range `[start, end]` of the source audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; zero if `end` precedes `start`.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Value for an HTTP `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Deterministic split of a source of `total_size` bytes into fixed-size chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    chunk_count: u64,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, PlanError> {
        if total_size == 0 {
            return Err(PlanError::EmptySource);
        }
        if chunk_size == 0 {
            return Err(PlanError::ZeroChunkSize);
        }
        Ok(Self {
            total_size,
            chunk_size,
            chunk_count: total_size.div_ceil(chunk_size),
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Byte range of chunk `index`, or `None` past the last chunk.
    /// The final chunk is clamped to `total_size - 1`.
    pub fn range(&self, index: u64) -> Option<ByteRange> {
        if index >= self.chunk_count {
            return None;
        }
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size - 1).min(self.total_size - 1);
        Some(ByteRange { start, end })
    }

    pub fn ranges(&self) -> impl Iterator<Item = ByteRange> + '_ {
        (0..self.chunk_count).filter_map(|i| self.range(i))
    }
}
