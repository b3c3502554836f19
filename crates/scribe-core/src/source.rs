use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::SourceError;
use crate::locator::Locator;
use crate::plan::ByteRange;

/// What a metadata probe learns about the source without reading its body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceMetadata {
    pub total_size: u64,
}

/// Remote audio that can be sized and read by byte range.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Existence and size check. Must not download the body.
    async fn probe(&self, locator: &Locator) -> Result<SourceMetadata, SourceError>;

    /// Read exactly the inclusive `range`. No retries.
    async fn fetch_range(&self, locator: &Locator, range: ByteRange) -> Result<Bytes, SourceError>;
}
