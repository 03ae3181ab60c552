use crate::{
    events::generate_events,
    Cluster,
    CollectError,
    Command,
    Record,
};
use futures::FutureExt as _;
use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Polls one command against every cluster on its own timer.
#[derive(Debug, Clone)]
pub struct Worker {
    command: Arc<Command>,
    clusters: Arc<[Arc<Cluster>]>,
    once: bool,
}

impl Worker {
    pub fn new(command: Command, clusters: Arc<[Arc<Cluster>]>) -> Self {
        Self {
            command: Arc::new(command),
            clusters,
            once: false,
        }
    }

    /// Stop after the first fetch instead of polling.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Spawns the polling task. The returned stream is closed once the task has stopped, either because `cancel`
    /// fired or because a single fetch was requested.
    pub fn start(self, cancel: CancellationToken) -> mpsc::Receiver<Record> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            debug!(command = %self.command.kind, uri = self.command.uri, "worker started");
            self.run(&tx, &cancel).await;
            debug!(command = %self.command.kind, "worker stopped");
        });
        rx
    }

    async fn run(&self, tx: &mpsc::Sender<Record>, cancel: &CancellationToken) {
        // The first tick completes immediately.
        let mut ticker = tokio::time::interval(self.command.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(CollectError::Cancelled) = self.fetch(tx, cancel).await {
                break;
            }
            if self.once {
                break;
            }
        }
    }

    /// One pass over all clusters. A failing cluster is logged and skipped.
    async fn fetch(&self, tx: &mpsc::Sender<Record>, cancel: &CancellationToken) -> Result<(), CollectError> {
        for cluster in self.clusters.iter() {
            let generated = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CollectError::Cancelled),
                generated = AssertUnwindSafe(generate_events(&self.command, cluster)).catch_unwind() => generated,
            };

            let records = match generated {
                Ok(Ok(records)) => records,
                Ok(Err(err)) => {
                    error!(cluster = cluster.name(), command = %self.command.kind, "fetch failed: {err}");
                    continue;
                }
                Err(_) => {
                    error!(cluster = cluster.name(), command = %self.command.kind, "fetch panicked");
                    continue;
                }
            };

            debug!(cluster = cluster.name(), command = %self.command.kind, records = records.len(), "fetched");
            for record in records {
                emit(tx, cancel, record).await?;
            }
        }
        Ok(())
    }
}

/// Hands a record to the output stream unless cancellation comes first or the stream has no reader left.
pub async fn emit(
    tx: &mpsc::Sender<Record>,
    cancel: &CancellationToken,
    record: Record,
) -> Result<(), CollectError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CollectError::Cancelled),
        sent = tx.send(record) => sent.map_err(|_| CollectError::Cancelled),
    }
}
