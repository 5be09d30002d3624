//! The relay's event loop.
//!
//! One task owns every watched handle: the operator's input, the listening
//! socket, the child's output pipe and each open client. Each iteration waits
//! until at least one of them is readable, takes one bounded read (or one
//! accept) from every handle that is ready, then dispatches the results in a
//! fixed priority order:
//!
//! 1. operator input
//! 2. listener
//! 3. child output
//! 4. clients, in registration order
//!
//! The priority decides which client becomes active when several send in the
//! same iteration: the later one in registration order wins.

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::process::ExitStatus;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::listener::format_peer_address;
use crate::operator::Operator;
use crate::registry::{ClientId, ClientRegistry};
use crate::router::ActiveClient;
use crate::spawner::ChildProcess;

/// Why the relay stopped. Both are normal shutdowns.
#[derive(Debug)]
pub enum Shutdown {
    /// The operator's input reached end-of-stream
    OperatorClosed,
    /// The child closed its output. `status` is set if it had already been reaped.
    ChildExited { status: Option<ExitStatus> },
}

/// Everything that was ready in one wake-up.
#[derive(Default)]
struct ReadyBatch {
    operator: Option<io::Result<Vec<u8>>>,
    accepted: Option<io::Result<(TcpStream, SocketAddr)>>,
    child: Option<io::Result<Vec<u8>>>,
    clients: Vec<(ClientId, io::Result<Vec<u8>>)>,
}

impl ReadyBatch {
    fn is_empty(&self) -> bool {
        self.operator.is_none()
            && self.accepted.is_none()
            && self.child.is_none()
            && self.clients.is_empty()
    }
}

pub struct Relay<R, W> {
    config: RelayConfig,
    operator: Operator<R, W>,
    listener: TcpListener,
    child: ChildProcess,
    clients: ClientRegistry<TcpStream>,
    active: ActiveClient,
    /// Read buffer shared by every handle; only ready reads are copied out.
    scratch: Vec<u8>,
}

impl<R, W> Relay<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        config: RelayConfig,
        operator: Operator<R, W>,
        listener: TcpListener,
        child: ChildProcess,
    ) -> Self {
        let scratch = vec![0u8; config.chunk_size];
        Self {
            config,
            operator,
            listener,
            child,
            clients: ClientRegistry::new(),
            active: ActiveClient::new(),
            scratch,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until the operator's input or the child's output closes.
    ///
    /// Returning drops the relay, which closes every client socket and the
    /// child's input pipe.
    pub async fn run(mut self) -> Result<Shutdown, RelayError> {
        info!(
            "Relaying {} (PID {:?}) on {:?}",
            self.child.command(),
            self.child.pid(),
            self.local_addr().ok()
        );

        loop {
            let batch = poll_fn(|cx| self.poll_ready(cx)).await;
            if let Some(shutdown) = self.dispatch(batch).await? {
                return Ok(shutdown);
            }
        }
    }

    /// Poll every watched handle once, in priority order. Pending until at
    /// least one of them produced something; every pending handle has its
    /// waker registered by the time this returns.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<ReadyBatch> {
        let scratch = &mut self.scratch;
        let mut batch = ReadyBatch {
            operator: poll_chunk(&mut self.operator.input, cx, scratch),
            ..Default::default()
        };

        if let Poll::Ready(accepted) = self.listener.poll_accept(cx) {
            batch.accepted = Some(accepted);
        }

        batch.child = poll_chunk(&mut self.child.stdout, cx, scratch);

        for conn in self.clients.iter_mut() {
            if let Some(result) = poll_chunk(&mut conn.handle, cx, scratch) {
                batch.clients.push((conn.id, result));
            }
        }

        if batch.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(batch)
        }
    }

    async fn dispatch(&mut self, batch: ReadyBatch) -> Result<Option<Shutdown>, RelayError> {
        if let Some(result) = batch.operator {
            let data = result.map_err(RelayError::OperatorRead)?;
            if data.is_empty() {
                info!("Operator input closed, shutting down");
                return Ok(Some(Shutdown::OperatorClosed));
            }
            self.handle_operator_input(&data).await;
        }

        if let Some(result) = batch.accepted {
            self.handle_accept(result).await;
        }

        if let Some(result) = batch.child {
            if let Some(shutdown) = self.handle_child_output(result).await {
                return Ok(Some(shutdown));
            }
        }

        for (id, result) in batch.clients {
            self.handle_client_read(id, result).await;
        }

        Ok(None)
    }

    async fn handle_operator_input(&mut self, data: &[u8]) {
        if !self.config.forward_operator_input {
            debug!("Discarding {} bytes of operator input", data.len());
            return;
        }
        let result = self.child.write(data).await;
        report_write("child (operator input)", result, data.len());
    }

    async fn handle_accept(&mut self, result: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, addr) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                return;
            }
        };

        let peer = format_peer_address(addr);
        let id = self.clients.register(stream, peer.clone());
        info!(client = %id, peer = %peer, live = self.clients.len(), "Client connected");

        if let Err(e) = self.operator.client_connected(id, &peer).await {
            warn!("Failed to report connection of client {}: {}", id, e);
        }
    }

    async fn handle_child_output(&mut self, result: io::Result<Vec<u8>>) -> Option<Shutdown> {
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read child output: {}", e);
                return None;
            }
        };

        if data.is_empty() {
            let status = self.child.exit_status();
            info!(
                "Child output closed (exit status: {:?}), shutting down with {} client(s) open",
                status,
                self.clients.len()
            );
            return Some(Shutdown::ChildExited { status });
        }

        debug!("Child produced {} bytes", data.len());
        if self.config.echo_child_output {
            let result = self.operator.write(&data).await;
            report_write("operator (child echo)", result, data.len());
        }
        self.send_to_active(&data);
        None
    }

    /// One non-blocking send to the active client. Whatever does not go out is dropped.
    fn send_to_active(&self, data: &[u8]) {
        let (id, stream) = match self.active.resolve(&self.clients) {
            Ok(target) => target,
            Err(e) => {
                warn!("Dropping {} bytes of child output: {}", data.len(), e);
                return;
            }
        };

        report_write(&format!("client {id}"), stream.try_write(data), data.len());
    }

    async fn handle_client_read(&mut self, id: ClientId, result: io::Result<Vec<u8>>) {
        match result {
            Ok(data) if !data.is_empty() => {
                debug!("Client {} sent {} bytes", id, data.len());
                let result = self.operator.write(&data).await;
                report_write("operator", result, data.len());
                let result = self.child.write(&data).await;
                report_write("child", result, data.len());
                self.active.set(id);
            }
            other => {
                if let Err(e) = other {
                    debug!("Read from client {} failed: {}", id, e);
                }
                // dropping the connection closes the socket
                self.clients.remove(id);
                info!(client = %id, live = self.clients.len(), "Client disconnected");
                if let Err(e) = self.operator.client_disconnected(id).await {
                    warn!("Failed to report disconnection of client {}: {}", id, e);
                }
            }
        }
    }
}

/// One bounded read into `scratch` if `source` is ready. `Some(Ok(empty))` is
/// end-of-stream.
fn poll_chunk<T>(
    source: &mut T,
    cx: &mut Context<'_>,
    scratch: &mut [u8],
) -> Option<io::Result<Vec<u8>>>
where
    T: AsyncRead + Unpin,
{
    let mut read_buf = ReadBuf::new(scratch);
    match Pin::new(source).poll_read(cx, &mut read_buf) {
        Poll::Ready(Ok(())) => Some(Ok(read_buf.filled().to_vec())),
        Poll::Ready(Err(e)) => Some(Err(e)),
        Poll::Pending => None,
    }
}

/// Log the outcome of a single-attempt forward. Anything not written is gone.
fn report_write(target: &str, result: io::Result<usize>, len: usize) {
    match result {
        Ok(n) if n == len => debug!("Forwarded {} bytes to {}", n, target),
        Ok(n) => warn!(
            "Short write to {}: {} of {} bytes, remainder dropped",
            target, n, len
        ),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            warn!("{} not ready, dropped {} bytes", target, len)
        }
        Err(e) => warn!("Write to {} failed, dropped {} bytes: {}", target, len, e),
    }
}
