//! Consumer dispatch core of WarrenMQ.
//!
//! A [`Broker`] owns one connection and one channel to an AMQP broker. Queues and consumers are
//! declared against it during setup, then [`Broker::run`] starts one worker per consumer and
//! blocks until every delivery stream is closed. [`Broker::close`] can be called from any task to
//! unwind a running dispatch.
//!
//! ```no_run
//! use warrenmq_consumer::*;
//! use lapin::options::BasicAckOptions;
//! use std::collections::HashMap;
//!
//! async fn serve(topology: Topology) -> anyhow::Result<()> {
//!     let mut handlers = HashMap::new();
//!
//!     handlers.insert(
//!         "orders_worker".to_string(),
//!         Handler::new(|_channel: lapin::Channel, delivery: lapin::message::Delivery| async move {
//!             if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
//!                 log::warn!("Ack of message #{} failed {:?}", delivery.delivery_tag, e);
//!             }
//!         }),
//!     );
//!
//!     let broker = Broker::start(&AmqpConnector::default(), &topology, handlers).await?;
//!
//!     broker.run().await?;
//!     broker.close().await;
//!
//!     Ok(())
//! }
//! ```
pub mod broker;
pub use broker::{Broker, HandlerMap};

pub mod connection;
pub use connection::BrokerHandle;

pub mod consumer;
pub use consumer::{ConsumerHandle, ConsumerRegistry, Handler};

pub mod dispatch;

mod error;
pub use error::{BrokerError, ErrorKind, Result};

mod model;
pub use model::{ConsumerDeclaration, Qos, QueueDeclaration, QueueHandle, QueueRef, Topology};

pub mod queue;
pub use queue::QueueRegistry;

pub mod transport;
pub use transport::amqp::{AmqpConnection, AmqpConnector};
pub use transport::{Channel, Connection, Connector};

#[cfg(test)]
mod tests;
