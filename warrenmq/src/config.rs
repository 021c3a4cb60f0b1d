use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use warrenmq_consumer::{QueueRef, Topology};

#[derive(Debug, Parser)]
#[command(name = "warrenmq", version, about = "AMQP consumer service")]
pub(crate) struct Cli {
    /// Path to the config file
    #[arg(short, long, value_name = "FILE", default_value = "warrenmq.toml")]
    pub(crate) config: String,
    /// Log level, it overrides the one in the config file
    #[arg(short, long, value_name = "LEVEL")]
    pub(crate) log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) log: Log,
    pub(crate) broker: Topology,
    #[serde(default)]
    pub(crate) handlers: BTreeMap<String, HandlerConfig>,
    #[serde(default)]
    pub(crate) monitoring: Monitoring,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct Log {
    pub(crate) level: String,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: "info".to_string(),
        }
    }
}

impl Log {
    pub(crate) fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level).map_err(|_| anyhow!("Invalid log level {}", self.level))
    }
}

/// The built-in handler a consumer gets its deliveries with.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum HandlerConfig {
    /// Log the delivery and ack it.
    Log,
    /// Publish the payload to another exchange, then ack it.
    Forward {
        #[serde(default)]
        exchange: String,
        routing_key: String,
    },
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Monitoring {
    /// Listen address of the HTTP health endpoint, it is not started if it is missing.
    pub(crate) http_listen: Option<String>,
}

pub(crate) fn parse_config(path: &str) -> Result<Config> {
    let cfg = std::fs::read_to_string(path).with_context(|| format!("Cannot read config file {}", path))?;

    Ok(toml::from_str(&cfg)?)
}

/// Parse the config file, apply the environment and the command line overrides and validate the
/// result.
pub(crate) fn load<E>(cli: &Cli, env: E) -> Result<Config>
where
    E: Fn(&str) -> Option<String>,
{
    let mut config = parse_config(&cli.config)?;

    config.apply_env(env);

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    config.validate()?;

    Ok(config)
}

impl Config {
    pub(crate) fn apply_env<E>(&mut self, env: E)
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(address) = env("WARRENMQ_BROKER_ADDRESS") {
            self.broker.address = address;
        }

        if let Some(level) = env("WARRENMQ_LOG_LEVEL") {
            self.log.level = level;
        }

        if let Some(listen) = env("WARRENMQ_MONITORING_HTTP_LISTEN") {
            self.monitoring.http_listen = Some(listen);
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.log.level_filter()?;

        let address = url::Url::parse(&self.broker.address).context("Invalid broker address")?;

        if !matches!(address.scheme(), "amqp" | "amqps") {
            bail!("Broker address scheme should be amqp or amqps, not {}", address.scheme());
        }

        if self.broker.qos.prefetch_size != 0 {
            bail!("Prefetch size {} is not supported, it should be 0", self.broker.qos.prefetch_size);
        }

        for (id, consumer) in &self.broker.consumers {
            if let QueueRef::ByLogicalId(queue_id) = &consumer.queue {
                if !self.broker.queues.contains_key(queue_id) {
                    bail!("Consumer {} refers to undeclared queue id {}", id, queue_id);
                }
            }

            if !self.handlers.contains_key(id) {
                bail!("Consumer {} doesn't have a handler", id);
            }
        }

        if let Some(listen) = &self.monitoring.http_listen {
            listen
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("Invalid HTTP listen address {}", listen))?;
        }

        Ok(())
    }
}
