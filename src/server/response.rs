//! Conversions between hyper messages and the crate's request/response types.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use http_body_util::{Either, Full, StreamBody};
use hyper::body::Frame;

use crate::core::{Body, BodyStream, Request, Response};

/// Response body handed to hyper: buffered or streamed frame by frame.
pub type HttpBody = Either<Full<Bytes>, StreamBody<FrameStream>>;

/// Adapts a [`BodyStream`] to the frame stream hyper polls.
///
/// Dropping it (for example when the client disconnects) drops the source
/// stream, closing files and channels it holds.
pub struct FrameStream {
    inner: BodyStream,
}

impl FrameStream {
    pub fn new(inner: BodyStream) -> Self {
        Self { inner }
    }
}

impl Stream for FrameStream {
    type Item = Result<Frame<Bytes>, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.as_mut().poll_next(cx) {
                // Empty chunks would read as end-of-body on some clients
                Poll::Ready(Some(Ok(chunk))) if chunk.is_empty() => continue,
                Poll::Ready(Some(Ok(chunk))) => return Poll::Ready(Some(Ok(Frame::data(chunk)))),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Convert a full hyper body into [`HttpBody`].
#[inline]
pub fn full_body(data: impl Into<Bytes>) -> HttpBody {
    Either::Left(Full::new(data.into()))
}

/// Convert a dispatcher response into a hyper response.
pub fn into_http_response(response: Response) -> hyper::Response<HttpBody> {
    let (status, headers, body) = response.into_parts();

    let body = match body {
        Body::Empty => full_body(Bytes::new()),
        Body::Full(bytes) => full_body(bytes),
        Body::Stream(stream) => Either::Right(StreamBody::new(FrameStream::new(stream))),
    };

    let mut res = hyper::Response::new(body);
    *res.status_mut() = status;
    *res.headers_mut() = headers;
    res
}

/// Build a crate request from collected hyper parts.
pub fn from_http_parts(
    parts: http::request::Parts,
    body: Bytes,
    remote_addr: SocketAddr,
) -> Request {
    let mut request = Request::new(parts.method, parts.uri, parts.headers, body);
    request.set_version(parts.version);
    request.with_remote_addr(remote_addr)
}

/// Canned response outside the dispatcher (body limits, bad framing).
pub fn canned(response: Response) -> Result<hyper::Response<HttpBody>, Infallible> {
    Ok(into_http_response(response))
}
