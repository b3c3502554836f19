use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use scribe_core::{AudioSource, ByteRange, Locator, SourceError, SourceMetadata};

/// Reads source audio over HTTP: `HEAD` for the size, `Range` GETs for chunks.
pub struct HttpAudioSource {
    client: Client,
    timeout: Duration,
}

impl HttpAudioSource {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SourceError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    fn send_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl AudioSource for HttpAudioSource {
    #[instrument(skip(self), fields(locator = %locator))]
    async fn probe(&self, locator: &Locator) -> Result<SourceMetadata, SourceError> {
        let resp = self
            .client
            .head(locator.as_str())
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !resp.status().is_success() {
            return Err(SourceError::Status {
                status: resp.status().as_u16(),
            });
        }

        // Read the header itself: reqwest reports the (empty) HEAD body length.
        let declared = resp
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(|| SourceError::MissingSize("no Content-Length header".into()))?;
        let total_size: u64 = declared
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| SourceError::MissingSize(format!("unparseable Content-Length {declared:?}")))?;
        if total_size == 0 {
            return Err(SourceError::MissingSize("declared size is zero".into()));
        }

        debug!(total_size, "source probed");
        Ok(SourceMetadata { total_size })
    }

    #[instrument(skip(self), fields(locator = %locator, range = %range))]
    async fn fetch_range(&self, locator: &Locator, range: ByteRange) -> Result<Bytes, SourceError> {
        let resp = self
            .client
            .get(locator.as_str())
            .header(RANGE, range.header_value())
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        // 200 means the range was ignored; only usable if the body is exactly the range.
        let status = resp.status();
        if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        if status == StatusCode::PARTIAL_CONTENT {
            if let Some(returned) = resp.headers().get(CONTENT_RANGE) {
                let returned = returned.to_str().unwrap_or_default();
                if parse_content_range(returned) != Some((range.start, range.end)) {
                    return Err(SourceError::UnexpectedRange {
                        requested: range.to_string(),
                        returned: returned.to_string(),
                    });
                }
            }
        }

        let expected = range.len();
        let mut buf = BytesMut::with_capacity(expected as usize);
        let mut body = resp.bytes_stream();
        while let Some(piece) = body.next().await {
            let piece = piece.map_err(|e| self.send_error(e))?;
            let actual = (buf.len() + piece.len()) as u64;
            if actual > expected {
                return Err(SourceError::RangeMismatch { expected, actual });
            }
            buf.extend_from_slice(&piece);
        }

        if buf.len() as u64 != expected {
            return Err(SourceError::RangeMismatch {
                expected,
                actual: buf.len() as u64,
            });
        }

        debug!(bytes = buf.len(), partial = status == StatusCode::PARTIAL_CONTENT, "range fetched");
        Ok(buf.freeze())
    }
}

/// Bounds of a `Content-Range: bytes start-end/total` value.
fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes ")?;
    let (bounds, _total) = spec.split_once('/')?;
    let (start, end) = bounds.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}
