use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use futures_util::stream::BoxStream;

/// Upper bound on a single chunk handed to the caller.
pub const RELAY_CHUNK_SIZE: usize = 4096;

type CaptureCallback = Box<dyn FnOnce(Bytes) + Send>;

/// Body stream that forwards upstream bytes in small chunks while keeping a
/// full copy. The copy is handed to `on_complete` exactly once: at end of
/// stream, on upstream error, or when the caller goes away mid-stream.
pub struct TeeBody {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    pending: Bytes,
    captured: BytesMut,
    on_complete: Option<CaptureCallback>,
}

impl TeeBody {
    pub fn new(
        inner: BoxStream<'static, reqwest::Result<Bytes>>,
        on_complete: impl FnOnce(Bytes) + Send + 'static,
    ) -> Self {
        Self {
            inner,
            pending: Bytes::new(),
            captured: BytesMut::new(),
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn finish(&mut self) {
        if let Some(cb) = self.on_complete.take() {
            let captured = std::mem::take(&mut self.captured).freeze();
            cb(captured);
        }
    }
}

impl Stream for TeeBody {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(RELAY_CHUNK_SIZE);
                return Poll::Ready(Some(Ok(this.pending.split_to(n))));
            }
            if this.on_complete.is_none() {
                return Poll::Ready(None);
            }
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.captured.extend_from_slice(&bytes);
                    this.pending = bytes;
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::warn!("Upstream body error while relaying: {}", e);
                    this.finish();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finish();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for TeeBody {
    fn drop(&mut self) {
        self.finish();
    }
}

// 这些头由本地连接自行处理，不能照搬上游的值
fn is_framing_header(name: &header::HeaderName, streaming: bool) -> bool {
    name == header::TRANSFER_ENCODING || (streaming && name == header::CONTENT_LENGTH)
}

pub fn relay_headers(upstream: &HeaderMap, streaming: bool) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(upstream.len() + 2);
    for (name, value) in upstream {
        if !is_framing_header(name, streaming) {
            out.append(name.clone(), value.clone());
        }
    }
    if streaming {
        out.entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static("no-cache"));
        out.entry(header::CONNECTION)
            .or_insert(HeaderValue::from_static("keep-alive"));
    }
    out
}

/// Mirror the upstream status and headers and stream its body to the caller.
pub fn relay(
    upstream: reqwest::Response,
    streaming: bool,
    on_complete: impl FnOnce(Bytes) + Send + 'static,
) -> Response {
    let status = upstream.status();
    let headers = relay_headers(upstream.headers(), streaming);
    let body = TeeBody::new(Box::pin(upstream.bytes_stream()), on_complete);

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
