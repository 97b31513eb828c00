use crate::datagram::{Datagram, RecvOutcome};
use crate::protocol::Response;
use crate::sender::Transport;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, trace, warn};

/// What happened while a monitor subscription was open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub updates: usize,
    pub rejected: usize,
    pub errors: usize,
}

impl<D: Datagram> Transport<D> {
    /// Receives push notifications until `deadline`.
    ///
    /// Every receive is bounded by the same absolute deadline, so the loop
    /// ends at `deadline` no matter how many datagrams arrive. Reaching it is
    /// the normal way out. Good responses go to `on_update` together with the
    /// time left in the subscription; everything else is logged and skipped.
    pub async fn monitor_wait<F>(&mut self, deadline: Instant, mut on_update: F) -> MonitorSummary
    where
        F: FnMut(Bytes, Duration),
    {
        info!("Entering monitor mode");
        let mut summary = MonitorSummary::default();
        loop {
            match self.socket.recv_until(&mut self.recv_buf, deadline).await {
                RecvOutcome::TimedOut => {
                    info!("Monitor interval has passed");
                    break;
                }
                RecvOutcome::Failed(e) => {
                    warn!("Could not receive update: {e}");
                    summary.errors += 1;
                }
                RecvOutcome::Received(len) => {
                    trace!("Received {len} bytes");
                    match Response::decode(&self.recv_buf[..len]) {
                        Ok(response) if response.is_good() => {
                            let remaining = deadline.saturating_duration_since(Instant::now());
                            info!("File changed, {} bytes pushed", response.payload.len());
                            summary.updates += 1;
                            on_update(response.payload, remaining);
                        }
                        Ok(response) => {
                            warn!("Server reported: {}", response.payload_text());
                            summary.rejected += 1;
                        }
                        Err(e) => {
                            warn!("Discarding undecodable update: {e}");
                            summary.errors += 1;
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                info!("Monitor interval has passed");
                break;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::testing::{ScriptedSocket, Step};
    use std::io::ErrorKind;

    fn transport(script: Vec<Step>) -> Transport<ScriptedSocket> {
        Transport::new(ScriptedSocket::new(script), 3, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_monitor_returns_at_deadline() {
        let mut transport = transport(vec![]);
        let start = Instant::now();
        let deadline = start + Duration::from_millis(1500);
        let mut calls = 0;

        let summary = transport.monitor_wait(deadline, |_, _| calls += 1).await;

        assert_eq!(calls, 0);
        assert_eq!(summary, MonitorSummary::default());
        let now = Instant::now();
        assert!(now >= deadline);
        assert!(now - deadline < Duration::from_millis(50));
        assert!(transport.socket().sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_are_forwarded_with_remaining_time() {
        let mut transport = transport(vec![
            Step::ReplyAfter(Duration::from_millis(100), b"\x01first".to_vec()),
            Step::ReplyAfter(Duration::from_millis(300), b"\x01second".to_vec()),
        ]);
        let deadline = Instant::now() + Duration::from_millis(1000);
        let mut updates = Vec::new();

        let summary = transport
            .monitor_wait(deadline, |payload, remaining| updates.push((payload, remaining)))
            .await;

        assert_eq!(summary.updates, 2);
        assert_eq!(updates.len(), 2);
        assert_eq!(&updates[0].0[..], b"first");
        assert_eq!(&updates[1].0[..], b"second");
        assert!(updates[0].1 > updates[1].1);
        assert!(updates[1].1 <= Duration::from_millis(600));
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_and_garbage_datagrams_do_not_end_monitoring() {
        let mut transport = transport(vec![
            Step::Reply(b"\x00Could not open file".to_vec()),
            Step::Reply(vec![9]),
            Step::Fail(ErrorKind::ConnectionRefused),
            Step::ReplyAfter(Duration::from_millis(50), b"\x01later".to_vec()),
        ]);
        let deadline = Instant::now() + Duration::from_millis(500);
        let mut seen = Vec::new();

        let summary = transport
            .monitor_wait(deadline, |payload, _| seen.push(payload))
            .await;

        assert_eq!(
            summary,
            MonitorSummary {
                updates: 1,
                rejected: 1,
                errors: 2,
            }
        );
        assert_eq!(seen, vec![Bytes::from_static(b"later")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_scheduled_past_deadline_is_never_delivered() {
        let mut transport = transport(vec![Step::ReplyAfter(
            Duration::from_millis(800),
            b"\x01too late".to_vec(),
        )]);
        let deadline = Instant::now() + Duration::from_millis(200);
        let mut calls = 0;

        let summary = transport.monitor_wait(deadline, |_, _| calls += 1).await;

        assert_eq!(calls, 0);
        assert_eq!(summary.updates, 0);
    }
}
