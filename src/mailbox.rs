//! Bounded inbound mailbox drained by a worker pool.
//!
//! Delivery from the notification source is best-effort: `submit` waits at
//! most `submit_timeout` for buffer space, then drops the event and logs.
//! The source is never blocked indefinitely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use crate::network::Notification;

/// Producer half of the mailbox.
#[derive(Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Notification>,
    submit_timeout: Duration,
}

/// Consumer half, shared by all workers in the pool.
#[derive(Clone)]
pub struct MailboxReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Notification>>>,
}

/// Create a bounded mailbox.
pub fn mailbox(capacity: usize, submit_timeout: Duration) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Mailbox { tx, submit_timeout },
        MailboxReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl Mailbox {
    /// Enqueue an event, waiting at most the submit timeout for space.
    ///
    /// Returns `false` when the event was dropped (full buffer or closed
    /// mailbox) — a capacity fault, invisible to the sender.
    pub async fn submit(&self, event: Notification) -> bool {
        match self.tx.send_timeout(event, self.submit_timeout).await {
            Ok(()) => true,
            Err(mpsc::error::SendTimeoutError::Timeout(event)) => {
                let acct = event
                    .status
                    .as_ref()
                    .map(|s| s.account.acct.as_str())
                    .unwrap_or("");
                warn!(acct, "inbox full: dropping mention");
                false
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                warn!("inbox closed: dropping mention");
                false
            }
        }
    }
}

impl MailboxReceiver {
    /// Pull the next event. `None` once all producers are gone.
    ///
    /// Workers take turns on the shared receiver; holding the inner lock only
    /// spans a single `recv`, so exactly one worker claims each event.
    pub async fn next(&self) -> Option<Notification> {
        self.rx.lock().await.recv().await
    }
}
