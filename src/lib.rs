#[macro_use]
extern crate tracing;

pub mod logging;

use ecsbeat_collector::{
    Ecsbeat,
    JsonLinesSink,
};
use ecsbeat_config::Config;
use eyre::Result;
use tokio_util::sync::CancellationToken;

pub fn init_errors() -> Result<()> {
    color_eyre::install()
}

/// Runs the beat until Ctrl-C, or until a single pass is published in once mode.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    let beat = Ecsbeat::new(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let published = match &config.output_file {
        Some(path) => {
            let mut sink = JsonLinesSink::append_to(path).await?;
            beat.run(&mut sink, cancel).await?
        }
        None => beat.run(&mut JsonLinesSink::stdout(), cancel).await?,
    };
    debug!(published, "done");
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received Ctrl-C, shutting down");
            cancel.cancel();
        }
        Err(err) => error!("failed to listen for Ctrl-C: {err}"),
    }
}
