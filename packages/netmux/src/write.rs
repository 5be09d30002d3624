//! Single-attempt writes.
//!
//! Every forward out of the event loop gets exactly one write. A destination
//! that is not ready reports `WouldBlock` instead of parking the loop, and
//! whatever part of the chunk was not accepted is the caller's to drop.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;

use tokio::io::AsyncWrite;

/// Offer `data` to `writer` once. Returns how many bytes it took.
pub(crate) async fn write_once<W>(writer: &mut W, data: &[u8]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let written = poll_fn(|cx| match Pin::new(&mut *writer).poll_write(cx, data) {
        Poll::Ready(result) => Poll::Ready(result),
        Poll::Pending => Poll::Ready(Err(io::ErrorKind::WouldBlock.into())),
    })
    .await?;

    // accepted bytes are already on their way; a pending flush is not retried
    poll_fn(|cx| match Pin::new(&mut *writer).poll_flush(cx) {
        Poll::Ready(result) => Poll::Ready(result),
        Poll::Pending => Poll::Ready(Ok(())),
    })
    .await?;

    Ok(written)
}
