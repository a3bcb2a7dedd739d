//! Bus wrappers around `tokio::sync::broadcast` so actors never handle the
//! broadcast types directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use playermap::PlayermapMessage;

/// Returned by `BusReceiver::poll()` once the bus is closed or the owning
/// actor has been asked to stop.
#[derive(Debug)]
pub enum PollError {
    Shutdown,
}

// ---------------------------------------------------------------------------
// BusSender
// ---------------------------------------------------------------------------

/// Sender that stamps the owning actor's ID as `source` on every message.
#[derive(Clone)]
pub struct BusSender {
    actor_id: String,
    inner: broadcast::Sender<PlayermapMessage>,
    shutdown: Arc<AtomicBool>,
}

impl BusSender {
    pub fn new(
        actor_id: String,
        inner: broadcast::Sender<PlayermapMessage>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            actor_id,
            inner,
            shutdown,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// The underlying broadcast sender, for code that needs its own
    /// subscriptions (the web layer).
    pub fn raw_sender(&self) -> &broadcast::Sender<PlayermapMessage> {
        &self.inner
    }

    pub fn send(&self, mut msg: PlayermapMessage) {
        msg.source = self.actor_id.clone();
        let _ = self.inner.send(msg);
    }

    /// New receiver sharing this sender's shutdown flag.
    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            inner: self.inner.subscribe(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

// ---------------------------------------------------------------------------
// BusReceiver
// ---------------------------------------------------------------------------

pub struct BusReceiver {
    inner: broadcast::Receiver<PlayermapMessage>,
    shutdown: Arc<AtomicBool>,
}

impl BusReceiver {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Non-blocking: next message, `Ok(None)` when drained, or
    /// `Err(PollError::Shutdown)` when closed or flagged.
    pub fn poll(&mut self) -> Result<Option<PlayermapMessage>, PollError> {
        if self.is_shutdown() {
            return Err(PollError::Shutdown);
        }
        loop {
            match self.inner.try_recv() {
                Ok(msg) => return Ok(Some(msg)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(PollError::Shutdown),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("bus: lagged, dropped {n} events");
                }
            }
        }
    }
}

impl From<broadcast::Receiver<PlayermapMessage>> for BusReceiver {
    fn from(inner: broadcast::Receiver<PlayermapMessage>) -> Self {
        Self {
            inner,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use playermap::{AlertLevel, AlertMessage, PlayermapEvent};

    use super::*;

    fn alert() -> PlayermapMessage {
        PlayermapMessage::new(AlertMessage {
            level: AlertLevel::Warn,
            message: "test".into(),
        })
    }

    #[test]
    fn send_stamps_source() {
        let (tx, _) = broadcast::channel(8);
        let shutdown = Arc::new(AtomicBool::new(false));
        let sender = BusSender::new("mock_players.0".into(), tx, shutdown);
        let mut rx = sender.subscribe();

        sender.send(alert().source("spoofed"));
        let msg = rx.poll().unwrap().unwrap();
        assert_eq!(msg.source, "mock_players.0");
        assert!(matches!(msg.event, PlayermapEvent::Alert(_)));
        assert!(rx.poll().unwrap().is_none());
    }

    #[test]
    fn poll_reports_shutdown() {
        let (tx, _) = broadcast::channel(8);
        let shutdown = Arc::new(AtomicBool::new(false));
        let sender = BusSender::new("system".into(), tx, Arc::clone(&shutdown));
        let mut rx = sender.subscribe();
        shutdown.store(true, Ordering::Relaxed);
        assert!(matches!(rx.poll(), Err(PollError::Shutdown)));
    }

    #[test]
    fn poll_reports_closed_bus() {
        let (tx, rx) = broadcast::channel::<PlayermapMessage>(8);
        let mut rx = BusReceiver::from(rx);
        drop(tx);
        assert!(matches!(rx.poll(), Err(PollError::Shutdown)));
    }
}
