use crate::datagram::{Datagram, RecvOutcome};
use crate::error::TransportError;
use crate::protocol::{Response, MAX_DATAGRAM_SIZE};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

pub type Result<T> = std::result::Result<T, TransportError>;

/// Request/response engine over an unreliable datagram endpoint.
///
/// Each call writes the already encoded request, waits up to `timeout` for
/// a reply and retransmits the identical bytes until `retries` attempts are
/// used up. Write failures, read failures and timeouts all consume an
/// attempt. The first datagram that arrives ends the call, whatever its
/// status.
pub struct Transport<D> {
    pub(crate) socket: D,
    retries: u32,
    timeout: Duration,
    pub(crate) recv_buf: Vec<u8>,
}

impl<D: Datagram> Transport<D> {
    pub fn new(socket: D, retries: u32, timeout: Duration) -> Self {
        Self {
            socket,
            retries,
            timeout,
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn socket(&self) -> &D {
        &self.socket
    }

    pub fn into_inner(self) -> D {
        self.socket
    }

    pub async fn send(&mut self, request: &[u8]) -> Result<Response> {
        let mut attempts = self.retries;
        while attempts > 0 {
            match self.socket.send(request).await {
                Ok(sent) => trace!("Sent {sent} bytes"),
                Err(e) => {
                    warn!("Could not send request: {e}");
                    attempts = consume_attempt(attempts);
                    continue;
                }
            }

            let deadline = Instant::now() + self.timeout;
            match self.socket.recv_until(&mut self.recv_buf, deadline).await {
                RecvOutcome::Received(len) => {
                    trace!("Received {len} bytes");
                    let response = Response::decode(&self.recv_buf[..len])?;
                    debug!("Server answered {response:?}");
                    return Ok(response);
                }
                RecvOutcome::TimedOut => warn!("Response timed out after {:?}", self.timeout),
                RecvOutcome::Failed(e) => warn!("Could not receive response: {e}"),
            }
            attempts = consume_attempt(attempts);
        }

        error!("Operation failed. Reached max retries ({})", self.retries);
        Err(TransportError::RetriesExhausted {
            attempts: self.retries,
        })
    }
}

fn consume_attempt(attempts: u32) -> u32 {
    let left = attempts.saturating_sub(1);
    if left > 0 {
        info!("Retrying! {left} attempts left");
    }
    left
}
