use crate::cache::CacheManager;
use crate::config::{resolve, ClientConfig};
use crate::datagram::Datagram;
use crate::error::{ClientError, Result};
use crate::protocol::{Operation, Request, Response, Sequence, Status};
use crate::sender::Transport;
use bytes::Bytes;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, info_span, Instrument, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Server,
}

/// Outcome of a session operation that reached a verdict. A `Bad` status
/// is the server refusing the operation; its payload says why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub payload: Bytes,
    pub source: Source,
}

impl Reply {
    fn from_server(response: Response) -> Self {
        Self {
            status: response.status,
            payload: response.payload,
            source: Source::Server,
        }
    }

    fn from_cache(payload: Bytes) -> Self {
        Self {
            status: Status::Good,
            payload,
            source: Source::Cache,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Good
    }

    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// One client session with the file server.
///
/// Owns the request counter, the transport and the read cache. Every
/// operation takes `&mut self`, so a session has at most one request or
/// monitor subscription in flight. Dropping the session closes its socket.
pub struct Session<D = UdpSocket> {
    id: u32,
    next_sequence: Sequence,
    transport: Transport<D>,
    cache: CacheManager,
    span: Span,
}

impl Session<UdpSocket> {
    /// Binds the local socket, connects it to the server and performs the
    /// handshake.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let server = resolve(&config.server).await?;
        let bind = resolve(&config.bind).await?;
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(server).await?;
        info!("Client bound to {} talking to {server}", socket.local_addr()?);
        Self::handshake(socket, config).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.transport.socket().local_addr()?)
    }
}

impl<D: Datagram> Session<D> {
    /// Opens a session over an already connected endpoint. The session id is
    /// the current epoch time in seconds, which fits a `u32` until 2106.
    pub async fn handshake(socket: D, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as u32);
        let mut session = Self {
            id,
            next_sequence: 0,
            transport: Transport::new(socket, config.retries, config.timeout()),
            cache: CacheManager::new(config.freshness()),
            span: info_span!("session", id),
        };

        info!(parent: &session.span, "Attempting to handshake with session id {id}");
        let reply = session.call(Operation::Handshake { session_id: id }).await?;
        if !reply.is_success() {
            return Err(ClientError::HandshakeRejected(
                reply.payload_text().into_owned(),
            ));
        }
        info!(parent: &session.span, "Handshake completed: {}", reply.payload_text());
        Ok(session)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sequence number the next request will carry.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn transport(&self) -> &Transport<D> {
        &self.transport
    }

    async fn call(&mut self, operation: Operation) -> Result<Reply> {
        let request = Request::new(self.next_sequence, operation);
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let encoded = {
            let _enter = self.span.enter();
            info!(
                "Creating req no. {} ({} {})",
                request.sequence,
                request.operation.op_code(),
                request.operation.path().unwrap_or_default()
            );
            request.encode()?
        };
        let response = self
            .transport
            .send(&encoded)
            .instrument(self.span.clone())
            .await?;
        Ok(Reply::from_server(response))
    }

    /// Serves the range from cache when a fresh entry covers it, otherwise
    /// asks the server and caches a successful answer.
    pub async fn read(&mut self, path: &str, offset: u32, amount: u32) -> Result<Reply> {
        let cached = self
            .span
            .in_scope(|| self.cache.get_entry(path, offset, amount));
        if let Some(data) = cached {
            info!(parent: &self.span, "Read of {amount} bytes at offset {offset} in {path} served from cache");
            return Ok(Reply::from_cache(data));
        }

        info!(parent: &self.span, "Sending request to read {amount} bytes starting at offset {offset} in {path}");
        let reply = self
            .call(Operation::Read {
                path: path.to_owned(),
                offset,
                amount,
            })
            .await?;
        if reply.is_success() {
            let _enter = self.span.enter();
            self.cache.add_entry(path, offset, reply.payload.clone());
        }
        Ok(reply)
    }

    // Writes leave cached ranges of the same file untouched; they stay
    // servable until they expire.
    pub async fn insert(&mut self, path: &str, offset: u32, data: impl Into<Bytes>) -> Result<Reply> {
        let data = data.into();
        info!(parent: &self.span, "Sending request to insert data of length {} at offset {offset} in {path}", data.len());
        self.call(Operation::Insert {
            path: path.to_owned(),
            offset,
            data,
        })
        .await
    }

    pub async fn update(&mut self, path: &str, offset: u32, data: impl Into<Bytes>) -> Result<Reply> {
        let data = data.into();
        info!(parent: &self.span, "Sending request to update data of length {} at offset {offset} in {path}", data.len());
        self.call(Operation::Update {
            path: path.to_owned(),
            offset,
            data,
        })
        .await
    }

    pub async fn delete(&mut self, path: &str, offset: u32, amount: u32) -> Result<Reply> {
        info!(parent: &self.span, "Sending request to delete {amount} bytes starting at offset {offset} in {path}");
        self.call(Operation::Delete {
            path: path.to_owned(),
            offset,
            amount,
        })
        .await
    }

    /// Subscribes to changes of `path` and blocks until `interval_ms` has
    /// passed since the server acknowledged the subscription.
    ///
    /// Each pushed file content is handed to `on_change`. It is also cached
    /// at offset 0 when the entry would still be fresh once the subscription
    /// ends, i.e. when less than one freshness interval is left.
    pub async fn monitor<F>(&mut self, path: &str, interval_ms: u32, mut on_change: F) -> Result<Reply>
    where
        F: FnMut(&Bytes),
    {
        info!(parent: &self.span, "Sending request to monitor {path} for the next {interval_ms}ms");
        let reply = self
            .call(Operation::Monitor {
                path: path.to_owned(),
                interval_ms,
            })
            .await?;
        if !reply.is_success() {
            return Ok(reply);
        }

        let deadline = Instant::now() + Duration::from_millis(u64::from(interval_ms));
        let cache = &mut self.cache;
        let freshness = cache.freshness();
        let summary = self
            .transport
            .monitor_wait(deadline, |payload, remaining| {
                if remaining < freshness {
                    cache.add_entry(path, 0, payload.clone());
                } else {
                    debug!("Not caching update, {remaining:?} of monitoring left");
                }
                on_change(&payload);
            })
            .instrument(self.span.clone())
            .await;
        info!(
            parent: &self.span,
            "Left monitor mode after {} updates ({} rejected, {} errors)",
            summary.updates,
            summary.rejected,
            summary.errors
        );
        Ok(reply)
    }

    /// Tells the server the session is over and closes the socket whatever
    /// the outcome.
    pub async fn disconnect(mut self) -> Result<Reply> {
        info!(parent: &self.span, "Sending disconnect notice");
        let outcome = self.call(Operation::Disconnect).await;
        info!(parent: &self.span, "Closing connection");
        outcome
    }
}
