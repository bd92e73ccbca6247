//! Outbound pacing scheduler.
//!
//! Replies are never sent directly: they are pushed into a time-ordered
//! queue that enforces a global minimum gap between any two deliveries and a
//! per-recipient minimum gap between deliveries to the same account. A single
//! delivery task owns the send order.
//!
//! Ready-times are computed and recorded under one critical section, so for
//! any two queued items the gap invariants hold regardless of how many
//! workers enqueue concurrently. Sequence numbers break ties in insertion
//! order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info};

use crate::network::StatusNetwork;

/// Pacing key charged for every delivery, regardless of recipient.
const GLOBAL_KEY: &str = "_global";

/// Pacing key for events with no known sender.
const ANON_KEY: &str = "_anon";

/// A reply waiting for its ready-time.
#[derive(Debug, Clone)]
pub struct QueuedReply {
    pub ready_at: Instant,
    pub seq: u64,
    pub reply_to: Option<String>,
    pub text: String,
}

impl PartialEq for QueuedReply {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for QueuedReply {}

impl PartialOrd for QueuedReply {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedReply {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.ready_at, self.seq).cmp(&(other.ready_at, other.seq))
    }
}

struct PacingState {
    heap: BinaryHeap<Reverse<QueuedReply>>,
    /// Last computed ready-time per pacing key.
    last: HashMap<String, Instant>,
    seq: u64,
}

/// Time-ordered delivery queue with per-key minimum gaps.
pub struct PacingScheduler {
    state: Mutex<PacingState>,
    notify: Notify,
    gap_global: Duration,
    gap_per_account: Duration,
}

impl PacingScheduler {
    pub fn new(gap_global: Duration, gap_per_account: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PacingState {
                heap: BinaryHeap::new(),
                last: HashMap::new(),
                seq: 0,
            }),
            notify: Notify::new(),
            gap_global,
            gap_per_account,
        })
    }

    /// Queue a reply for delivery no earlier than its computed ready-time.
    pub async fn enqueue(&self, recipient: &str, reply_to: Option<String>, text: String) {
        let key = if recipient.is_empty() {
            ANON_KEY
        } else {
            recipient
        };

        {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            let mut ready = now;
            if let Some(&global) = state.last.get(GLOBAL_KEY) {
                ready = ready.max(global + self.gap_global);
            }
            if let Some(&account) = state.last.get(key) {
                ready = ready.max(account + self.gap_per_account);
            }

            state.last.insert(GLOBAL_KEY.to_string(), ready);
            state.last.insert(key.to_string(), ready);
            state.seq += 1;

            let delay = ready.saturating_duration_since(now);
            debug!(
                recipient = key,
                delay_ms = delay.as_millis() as u64,
                "reply queued"
            );

            let seq = state.seq;
            state.heap.push(Reverse(QueuedReply {
                ready_at: ready,
                seq,
                reply_to,
                text,
            }));
        }

        self.notify.notify_one();
    }

    /// Number of replies still waiting.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    /// Pop the earliest reply if its ready-time has passed.
    async fn pop_due(&self) -> Result<QueuedReply, Option<Instant>> {
        let mut state = self.state.lock().await;
        match state.heap.peek() {
            Some(Reverse(next)) if next.ready_at <= Instant::now() => {
                Ok(state.heap.pop().expect("peeked entry present").0)
            }
            Some(Reverse(next)) => Err(Some(next.ready_at)),
            None => Err(None),
        }
    }

    /// Spawn the single delivery task.
    ///
    /// Pops the earliest item; if its ready-time is in the future, sleeps
    /// until then but re-validates on every enqueue signal, since a new
    /// earlier item may have arrived. Send failures are logged and the item
    /// dropped — re-queuing under a sustained outage would grow the backlog
    /// without bound.
    pub fn spawn_delivery(
        self: &Arc<Self>,
        network: Arc<dyn StatusNetwork>,
        visibility: String,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            info!("delivery task started");
            loop {
                match scheduler.pop_due().await {
                    Ok(item) => {
                        if let Err(e) = network
                            .post_status(&item.text, item.reply_to.as_deref(), &visibility)
                            .await
                        {
                            error!(error = %e, reply_to = ?item.reply_to, "send failed; dropping reply");
                        }
                    }
                    Err(Some(ready_at)) => {
                        tokio::select! {
                            _ = scheduler.notify.notified() => {}
                            _ = sleep_until(ready_at) => {}
                        }
                    }
                    Err(None) => scheduler.notify.notified().await,
                }
            }
        })
    }
}
