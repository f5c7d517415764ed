//! TCP connection to the game server
//!
//! One duplex stream per connection, split into three tasks:
//! - reader: pulls delimited frames and decodes them one by one
//! - dispatcher: hands decoded pushes to the handler in arrival order
//! - writer: the only task that writes to the socket
//!
//! A frame that fails to decode is logged and skipped; the reader keeps
//! going. EOF or a read error marks the connection closed.

use std::io;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot, watch};

use crate::core::error::{IgniteError, Result};
use crate::net::message::{Request, Response};
use crate::net::IntentSink;

/// Callback invoked for every decoded server push
pub type Handler = Arc<dyn Fn(Response) + Send + Sync>;

type HandlerSlot = Arc<RwLock<Option<Handler>>>;

/// Encoded frame waiting for the writer
struct Outbound {
    frame: String,
    done: Option<oneshot::Sender<Result<()>>>,
}

struct Inner {
    address: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    handler: HandlerSlot,
    closed: Arc<watch::Sender<bool>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.closed.send_replace(true);
    }
}

/// Handle to a live server connection. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Dial the server and start the reader, dispatcher and writer tasks
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect<A>(address: A, max_frame_len: usize) -> Result<Self>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let label = address.to_string();
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| IgniteError::Connect {
                address: label.clone(),
                source,
            })?;
        let address = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or(label);
        let (rd, wr) = stream.into_split();

        let closed = Arc::new(watch::channel(false).0);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let handler: HandlerSlot = Arc::new(RwLock::new(None));

        tokio::spawn(read_loop(rd, push_tx, closed.clone(), max_frame_len));
        tokio::spawn(dispatch_loop(push_rx, handler.clone()));
        tokio::spawn(write_loop(wr, out_rx, closed.subscribe()));

        tracing::info!(address = %address, "connected to game server");

        Ok(Self {
            inner: Arc::new(Inner {
                address,
                outbound: out_tx,
                handler,
                closed,
            }),
        })
    }

    /// Remote address of the server
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Register the push handler, replacing any previous one
    ///
    /// Pushes decoded while no handler is set are dropped.
    pub fn set_handler(&self, handler: Handler) {
        let mut slot = self.inner.handler.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(handler);
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolve once the connection is closed, locally or by the peer
    pub async fn wait_closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        // Err only if the sender is gone, which also means closed
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Send a request and wait until it is written to the socket
    pub async fn send(&self, request: &Request) -> Result<()> {
        let frame = self.prepare(request)?;
        let (tx, rx) = oneshot::channel();
        self.inner
            .outbound
            .send(Outbound {
                frame,
                done: Some(tx),
            })
            .map_err(|_| IgniteError::Closed)?;
        rx.await.map_err(|_| IgniteError::Closed)?
    }

    /// Ask the server for an update push
    pub async fn update(&self) -> Result<()> {
        self.send(&Request::default()).await
    }

    /// Close the connection. Safe to call more than once and while a send
    /// is in flight; pending sends resolve to `Closed`.
    pub fn close(&self) {
        if !self.inner.closed.send_replace(true) {
            tracing::info!(address = %self.inner.address, "closing server connection");
        }
    }

    fn prepare(&self, request: &Request) -> Result<String> {
        if self.is_closed() {
            return Err(IgniteError::Closed);
        }
        request.encode()
    }
}

impl IntentSink for Connection {
    /// Queue a request without waiting for the write. Frames keep the
    /// order they were posted in; write failures are logged.
    fn post(&self, request: Request) -> Result<()> {
        let frame = self.prepare(&request)?;
        self.inner
            .outbound
            .send(Outbound { frame, done: None })
            .map_err(|_| IgniteError::Closed)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.inner.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn read_loop(
    rd: OwnedReadHalf,
    pushes: mpsc::UnboundedSender<Response>,
    closed: Arc<watch::Sender<bool>>,
    max_frame_len: usize,
) {
    let mut shutdown = closed.subscribe();
    let mut reader = BufReader::new(rd);
    let mut buf = Vec::new();

    loop {
        if *shutdown.borrow() {
            break;
        }
        buf.clear();
        let read = tokio::select! {
            _ = shutdown.changed() => break,
            read = read_frame(&mut reader, &mut buf, max_frame_len) => read,
        };
        match read {
            Ok(Frame::Eof) => {
                tracing::info!("server closed the connection");
                break;
            }
            Ok(Frame::Line) => {}
            Ok(Frame::Oversized) => {
                tracing::warn!(max = max_frame_len, "skipping oversized frame");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "unable to read from the server");
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(['\r', '\n']),
            Err(e) => {
                tracing::warn!(error = %e, "skipping frame with invalid UTF-8");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match Response::decode(line) {
            Ok(resp) => {
                if pushes.send(resp).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping undecodable frame"),
        }
    }

    closed.send_replace(true);
}

enum Frame {
    Eof,
    Line,
    Oversized,
}

/// Read one delimited frame into `buf`, holding at most `max_len + 1` bytes
///
/// An overlong frame is dropped up to and including its delimiter.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max_len: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max_len.saturating_add(1) as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }
    if buf.len() <= max_len {
        return Ok(Frame::Line);
    }
    if buf.last() != Some(&b'\n') {
        discard_line(reader).await?;
    }
    buf.clear();
    Ok(Frame::Oversized)
}

async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}

async fn dispatch_loop(mut pushes: mpsc::UnboundedReceiver<Response>, handler: HandlerSlot) {
    while let Some(resp) = pushes.recv().await {
        let current = handler.read().unwrap_or_else(PoisonError::into_inner).clone();
        match current {
            Some(handle) => handle(resp),
            None => tracing::debug!("no push handler registered, dropping push"),
        }
    }
}

async fn write_loop(
    mut wr: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let msg = tokio::select! {
            _ = shutdown.changed() => break,
            msg = outbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        // A write stalled on a peer that stops reading must not outlive close
        let result = tokio::select! {
            _ = shutdown.changed() => Err(IgniteError::Closed),
            result = write_frame(&mut wr, &msg.frame) => result,
        };
        let stop = matches!(result, Err(IgniteError::Closed));
        match msg.done {
            Some(done) => {
                let _ = done.send(result);
            }
            None => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "unable to send request");
                }
            }
        }
        if stop {
            break;
        }
    }

    if let Err(e) = wr.shutdown().await {
        tracing::debug!(error = %e, "socket shutdown failed");
    }
}

async fn write_frame(wr: &mut OwnedWriteHalf, frame: &str) -> Result<()> {
    wr.write_all(frame.as_bytes())
        .await
        .map_err(|e| IgniteError::Send(format!("unable to write request: {}", e)))?;
    wr.flush()
        .await
        .map_err(|e| IgniteError::Send(format!("unable to flush request: {}", e)))
}
