mod config;
mod handlers;
mod restapi;

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::io::Write;
use std::sync::Arc;
use tokio::signal;
use warrenmq_consumer::{AmqpConnector, Broker};

fn setup_logger(level: LevelFilter) {
    let mut builder = Builder::new();

    builder
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            let lvl = buf.default_level_style(record.level()).bold();

            writeln!(
                buf,
                "{} - [{lvl}{:5}{lvl:#}] {}:{} - {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Always)
        .init();
}

#[tokio::main]
pub async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    let config = config::load(&cli, |key| std::env::var(key).ok())?;

    setup_logger(config.log.level_filter()?);

    info!("Starting WarrenMQ {}", env!("CARGO_PKG_VERSION"));

    let handlers = handlers::build(&config);
    let connector = AmqpConnector::with_connection_name("warrenmq");
    let broker = Arc::new(Broker::start(&connector, &config.broker, handlers).await?);

    if let Some(http_listen) = &config.monitoring.http_listen {
        restapi::serve_health(http_listen, broker.clone()).await?;
    }

    let shutdown = {
        let broker = broker.clone();

        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Cannot listen for the interrupt signal {:?}", e);
                return;
            }

            info!("Interrupted, closing the broker");

            broker.close().await;
        })
    };

    let result = broker.run().await;

    shutdown.abort();
    broker.close().await;

    info!("WarrenMQ stopped");

    result
}
