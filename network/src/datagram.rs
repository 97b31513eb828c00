use std::future::Future;
use std::io;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

/// Result of a receive bounded by a deadline. Whether `TimedOut` is a
/// failure is decided by the caller.
#[derive(Debug)]
pub enum RecvOutcome {
    Received(usize),
    TimedOut,
    Failed(io::Error),
}

/// A connected datagram endpoint. Closing is dropping.
pub trait Datagram {
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    fn recv_until(
        &self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> impl Future<Output = RecvOutcome> + Send;
}

impl Datagram for UdpSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf).await
    }

    async fn recv_until(&self, buf: &mut [u8], deadline: Instant) -> RecvOutcome {
        match timeout_at(deadline, self.recv(buf)).await {
            Ok(Ok(len)) => RecvOutcome::Received(len),
            Ok(Err(e)) => RecvOutcome::Failed(e),
            Err(_) => RecvOutcome::TimedOut,
        }
    }
}
