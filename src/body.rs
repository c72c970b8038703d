//! Re-readable request body.
//!
//! A hyper body is a one-shot stream: whoever polls it first consumes it. The
//! trace middleware wants to look at the body *after* the handler ran, and the
//! handler may or may not have read it. [`Body`] solves this by buffering on
//! first access and handing out the same bytes, from the start, to every
//! later reader. A stream that fails does so for every reader alike.
//!
//! ```text
//! handler: body.bytes().await   ← streams the socket into the buffer
//! tracer:  body.bytes().await   ← same buffer, position 0
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use tokio::sync::OnceCell;

use crate::error::{BoxError, Error, SharedError};

type Source = UnsyncBoxBody<Bytes, BoxError>;

/// A request body shared between every consumer of one request.
///
/// Cloning is one atomic increment. All clones observe the same buffer.
#[derive(Clone)]
pub struct Body {
    shared: Arc<Shared>,
}

struct Shared {
    // Taken exactly once, by whichever reader buffers first.
    source: Mutex<Option<Source>>,
    buffered: OnceCell<Result<Bytes, SharedError>>,
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// A body that is already fully buffered.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            shared: Arc::new(Shared {
                source: Mutex::new(None),
                buffered: OnceCell::new_with(Some(Ok(bytes.into()))),
            }),
        }
    }

    /// Wraps a streaming body. Nothing is read until the first call to
    /// [`bytes`](Body::bytes) or [`text`](Body::text).
    pub fn from_stream<B>(body: B) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self {
            shared: Arc::new(Shared {
                source: Mutex::new(Some(body.map_err(Into::<BoxError>::into).boxed_unsync())),
                buffered: OnceCell::new(),
            }),
        }
    }

    /// The whole body, from its first byte.
    ///
    /// The first caller drives the underlying stream to completion; every
    /// later caller (or a concurrent one) gets the same buffer, or the same
    /// [`Error::Body`] if the stream failed.
    pub async fn bytes(&self) -> Result<Bytes, Error> {
        let buffered = self
            .shared
            .buffered
            .get_or_init(|| async {
                let source = self
                    .shared
                    .source
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();

                match source {
                    Some(stream) => stream
                        .collect()
                        .await
                        .map(|collected| collected.to_bytes())
                        .map_err(SharedError::from),
                    None => Ok(Bytes::new()),
                }
            })
            .await;

        buffered.clone().map_err(Error::Body)
    }

    /// The whole body decoded as UTF-8. Invalid sequences are replaced with
    /// `U+FFFD`.
    pub async fn text(&self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Whether the body has been pulled off the wire yet, successfully or not.
    pub fn is_buffered(&self) -> bool {
        self.shared.buffered.initialized()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Full<Bytes>> for Body {
    fn from(full: Full<Bytes>) -> Self {
        Self::from_stream(full)
    }
}
