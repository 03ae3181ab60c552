use crate::{
    publish_all,
    Cluster,
    Command,
    Sink,
    Worker,
};
use ecsbeat_config::Config;
use eyre::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Supervises the clusters, their metadata refresh and one worker per enabled command.
#[derive(Debug)]
pub struct Ecsbeat {
    clusters: Arc<[Arc<Cluster>]>,
    commands: Vec<Command>,
    once: bool,
}

impl Ecsbeat {
    pub fn new(config: &Config) -> Result<Self> {
        let clusters = config
            .customers
            .iter()
            .map(|customer| Cluster::from_customer(customer).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let commands = config
            .enabled_commands()
            .map(|command| Command::from_config(command, config.effective_interval(command)))
            .collect();

        Ok(Self::with_parts(clusters, commands, config.once))
    }

    pub fn with_parts(clusters: Vec<Arc<Cluster>>, commands: Vec<Command>, once: bool) -> Self {
        Self {
            clusters: clusters.into(),
            commands,
            once,
        }
    }

    pub fn clusters(&self) -> &[Arc<Cluster>] {
        &self.clusters
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub async fn refresh(&self) {
        for cluster in self.clusters.iter() {
            cluster.refresh().await;
        }
    }

    /// Runs until `cancel` fires, or in once mode until every worker finished its single fetch. Returns the number
    /// of published records.
    pub async fn run(self, sink: &mut dyn Sink, cancel: CancellationToken) -> Result<u64> {
        info!(
            clusters = self.clusters.len(),
            commands = self.commands.len(),
            once = self.once,
            "ecsbeat is running"
        );

        // Workers need identities before their first fetch.
        self.refresh().await;

        let refresh_cancel = cancel.child_token();
        let refreshers: Vec<JoinHandle<()>> = self
            .clusters
            .iter()
            .filter(|cluster| !cluster.config().refresh_interval.is_zero())
            .map(|cluster| tokio::spawn(refresh_loop(cluster.clone(), refresh_cancel.clone())))
            .collect();

        let receivers = self
            .commands
            .iter()
            .map(|command| {
                Worker::new(command.clone(), self.clusters.clone())
                    .once(self.once)
                    .start(cancel.clone())
            })
            .collect();

        let published = publish_all(sink, receivers).await;

        refresh_cancel.cancel();
        for refresher in refreshers {
            if let Err(err) = refresher.await {
                error!("metadata refresh task failed: {err}");
            }
        }

        if let Err(err) = sink.close().await {
            error!("failed to close the sink: {err}");
        }
        for cluster in self.clusters.iter() {
            cluster.client().close().await;
        }

        info!(published, "ecsbeat stopped");
        Ok(published)
    }
}

async fn refresh_loop(cluster: Arc<Cluster>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(cluster.config().refresh_interval);
    // Skip the immediate first tick, the eager refresh already ran.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = cluster.refresh() => {}
        }
    }
    debug!(cluster = cluster.name(), "metadata refresh stopped");
}
