use clap::Parser;
use color_eyre::Result;
use ecsbeat::{
    init_errors,
    logging,
    run,
};
use ecsbeat_config::{
    Args,
    Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let config = Config::new(Args::parse())?;
    logging::log_init(&config)?;
    run(config).await
}
