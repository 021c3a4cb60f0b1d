//! Built-in delivery handlers the consumers can be configured with.
use crate::config::{Config, HandlerConfig};
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions, BasicPublishOptions};
use lapin::Channel;
use log::{debug, info, warn};
use std::sync::Arc;
use warrenmq_consumer::{Handler, HandlerMap};

/// Build the handlers of the configured consumers. Handlers configured for undeclared consumers
/// are built as well, the broker drops them with a warning.
pub(crate) fn build(config: &Config) -> HandlerMap<Channel> {
    config
        .handlers
        .iter()
        .map(|(id, handler)| {
            let auto_ack = config
                .broker
                .consumers
                .get(id)
                .map(|consumer| consumer.auto_ack)
                .unwrap_or_default();

            let handler = match handler {
                HandlerConfig::Log => log_handler(id, auto_ack),
                HandlerConfig::Forward { exchange, routing_key } => {
                    forward_handler(id, exchange, routing_key, auto_ack)
                }
            };

            (id.clone(), handler)
        })
        .collect()
}

fn log_handler(consumer_id: &str, auto_ack: bool) -> Handler<Channel> {
    let consumer_id: Arc<str> = Arc::from(consumer_id);

    Handler::new(move |_channel: Channel, delivery: Delivery| {
        let consumer_id = consumer_id.clone();

        async move {
            info!(
                "Consumer {} got message #{} exchange {} routing key {} redelivered {} size {}",
                consumer_id,
                delivery.delivery_tag,
                delivery.exchange.as_str(),
                delivery.routing_key.as_str(),
                delivery.redelivered,
                delivery.data.len()
            );

            if !auto_ack {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!("Ack of message #{} failed {:?}", delivery.delivery_tag, e);
                }
            }
        }
    })
}

fn forward_handler(consumer_id: &str, exchange: &str, routing_key: &str, auto_ack: bool) -> Handler<Channel> {
    let consumer_id: Arc<str> = Arc::from(consumer_id);
    let exchange: Arc<str> = Arc::from(exchange);
    let routing_key: Arc<str> = Arc::from(routing_key);

    Handler::new(move |channel: Channel, delivery: Delivery| {
        let consumer_id = consumer_id.clone();
        let exchange = exchange.clone();
        let routing_key = routing_key.clone();

        async move {
            let published = match channel
                .basic_publish(
                    &exchange,
                    &routing_key,
                    BasicPublishOptions::default(),
                    &delivery.data,
                    delivery.properties.clone(),
                )
                .await
            {
                Ok(confirm) => confirm.await.map(|_| ()),
                Err(e) => Err(e),
            };

            match published {
                Ok(()) => {
                    debug!(
                        "Consumer {} forwarded message #{} to {}/{}",
                        consumer_id, delivery.delivery_tag, exchange, routing_key
                    );

                    if !auto_ack {
                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            warn!("Ack of message #{} failed {:?}", delivery.delivery_tag, e);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Consumer {} cannot forward message #{} {:?}",
                        consumer_id, delivery.delivery_tag, e
                    );

                    if !auto_ack {
                        let options = BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        };

                        if let Err(e) = delivery.nack(options).await {
                            warn!("Nack of message #{} failed {:?}", delivery.delivery_tag, e);
                        }
                    }
                }
            }
        }
    })
}
