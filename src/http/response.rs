//! Streaming relay of upstream responses.
//!
//! # Responsibilities
//! - Send status and filtered headers as soon as the upstream replies
//! - Copy the body frame by frame, never buffering it whole
//! - Keep enforcing the upstream deadline while the body streams
//! - Log relay failures; the status line is already gone by then
//! - Log the full exchange time, body included, once the relay ends
//!
//! # Design Decisions
//! - A mid-stream failure ends the body with an error so hyper aborts the
//!   connection; the client sees truncation, never a second status
//! - Dropping the relay early (client went away) is logged, not an error

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::Response;
use bytes::Bytes;
use http_body::{Frame, SizeHint};
use thiserror::Error;
use tokio::time::Sleep;

use crate::proxy::error::BoxError;
use crate::proxy::UpstreamResponse;
use crate::security::redact::sanitize_error;

/// Failure raised by the relay itself.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream deadline exceeded while streaming body")]
    DeadlineExceeded,
}

/// Body wrapper that relays an upstream body to the client.
pub struct RelayBody<B>
where
    B: http_body::Body,
{
    inner: B,
    deadline: Pin<Box<Sleep>>,
    path: String,
    started: Instant,
    bytes: u64,
    done: bool,
}

impl<B> RelayBody<B>
where
    B: http_body::Body,
{
    /// `started` is when the inbound request arrived.
    pub fn new(
        inner: B,
        deadline: tokio::time::Instant,
        path: impl Into<String>,
        started: Instant,
    ) -> Self {
        Self {
            inner,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            path: path.into(),
            started,
            bytes: 0,
            done: false,
        }
    }

    fn fail(&mut self, err: BoxError) -> BoxError {
        self.done = true;
        let err_ref: &(dyn StdError + 'static) = &*err;
        tracing::error!(
            path = %self.path,
            bytes_relayed = self.bytes,
            duration_ms = self.elapsed_ms(),
            error = %sanitize_error(err_ref),
            "Response body relay failed after headers were sent"
        );
        err
    }

    fn finish(&mut self) {
        self.done = true;
        tracing::info!(
            path = %self.path,
            bytes_relayed = self.bytes,
            duration_ms = self.elapsed_ms(),
            "Response body relayed"
        );
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl<B> http_body::Body for RelayBody<B>
where
    B: http_body::Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                }
                // hyper may stop polling once the inner body reports its end.
                if this.inner.is_end_stream() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(this.fail(err.into())))),
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => {
                if this.deadline.as_mut().poll(cx).is_ready() {
                    return Poll::Ready(Some(Err(this.fail(Box::new(RelayError::DeadlineExceeded)))));
                }
                Poll::Pending
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for RelayBody<B>
where
    B: http_body::Body,
{
    fn drop(&mut self) {
        if !self.done && !self.inner.is_end_stream() {
            tracing::warn!(
                path = %self.path,
                bytes_relayed = self.bytes,
                duration_ms = self.elapsed_ms(),
                "Client went away before the response body completed"
            );
        }
    }
}

/// Turn an upstream reply into the client response.
///
/// `started` is when the inbound request arrived; the relay logs the total
/// time once the body ends.
pub fn stream_response(upstream: UpstreamResponse, path: &str, started: Instant) -> Response<Body> {
    let UpstreamResponse {
        status,
        headers,
        body,
        deadline,
    } = upstream;

    let mut response = Response::new(Body::new(RelayBody::new(body, deadline, path, started)));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
