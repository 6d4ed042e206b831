use serde::Serialize;
use tokio::sync::watch;

/// One progress update for a job. `current` / `total` count months for a
/// single simulation and completed trials for a Monte-Carlo job. The final
/// update of a job has `done = true` and carries the terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub percent: f64,
    pub current: u32,
    pub total: u32,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl ProgressEvent {
    fn initial() -> Self {
        ProgressEvent {
            percent: 0.0,
            current: 0,
            total: 0,
            done: false,
            outcome: None,
        }
    }
}

/// Single-producer, many-subscriber progress channel.
///
/// Built on a `watch` slot: publishing never blocks, updates coalesce to
/// the latest value, and late subscribers see the newest state on attach.
#[derive(Debug)]
pub struct ProgressChannel {
    tx: watch::Sender<ProgressEvent>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressEvent::initial());
        ProgressChannel { tx }
    }

    pub fn publish(&self, current: u32, total: u32) {
        let percent = if total > 0 {
            current as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        self.tx.send_replace(ProgressEvent {
            percent,
            current,
            total,
            done: false,
            outcome: None,
        });
    }

    /// Mark the job terminal. Exactly one `done` event ends every
    /// subscription.
    pub fn finish(&self, outcome: &str) {
        self.tx.send_modify(|event| {
            event.done = true;
            event.outcome = Some(outcome.to_string());
        });
    }

    pub fn latest(&self) -> ProgressEvent {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            rx: self.tx.subscribe(),
            delivered_snapshot: false,
            finished: false,
        }
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view of a job's progress. Yields the latest snapshot
/// first, then every subsequent update until the `done` event, then `None`.
#[derive(Debug)]
pub struct ProgressSubscription {
    rx: watch::Receiver<ProgressEvent>,
    delivered_snapshot: bool,
    finished: bool,
}

impl ProgressSubscription {
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }

        if !self.delivered_snapshot {
            self.delivered_snapshot = true;
            let event = self.rx.borrow_and_update().clone();
            if event.done {
                self.finished = true;
            }
            return Some(event);
        }

        match self.rx.changed().await {
            Ok(()) => {
                let event = self.rx.borrow_and_update().clone();
                if event.done {
                    self.finished = true;
                }
                Some(event)
            }
            // Producer dropped without a done event; close the stream.
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}
