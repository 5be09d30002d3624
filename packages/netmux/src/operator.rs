use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, Stdin};

use crate::registry::ClientId;
use crate::write::write_once;

/// The operator's own input and output streams.
///
/// The binary uses the process's stdin/stdout; tests plug in in-memory pipes.
pub struct Operator<R, W> {
    pub(crate) input: R,
    output: W,
}

impl Operator<Stdin, TerminalOut> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), TerminalOut(io::stdout()))
    }
}

/// Process stdout, written in place on the loop's thread.
///
/// tokio's `Stdout` hands each write to the blocking pool and reports the next
/// one as pending until that finishes, which would turn back-to-back forwards
/// into dropped chunks.
pub struct TerminalOut(io::Stdout);

impl AsyncWrite for TerminalOut {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(self.get_mut().0.write(buf))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.get_mut().0.flush())
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}

impl<R, W> Operator<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Offer raw relay bytes to the operator's output once.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        write_once(&mut self.output, data).await
    }

    pub async fn client_connected(&mut self, id: ClientId, peer: &str) -> io::Result<()> {
        self.status(format!("client {id} connected: {peer}\n")).await
    }

    pub async fn client_disconnected(&mut self, id: ClientId) -> io::Result<()> {
        self.status(format!("client {id} disconnected\n")).await
    }

    /// A status line that only partly fits is reported as `WriteZero`.
    async fn status(&mut self, line: String) -> io::Result<()> {
        let written = self.write(line.as_bytes()).await?;
        if written < line.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("status line cut after {written} of {} bytes", line.len()),
            ));
        }
        Ok(())
    }
}
