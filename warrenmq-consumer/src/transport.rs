//! The seam between the dispatch core and the broker client library.
//!
//! The core needs only a few operations from the protocol: connecting, opening one channel,
//! setting prefetch, declaring queues, starting consumers and closing. [`amqp`] implements them on
//! top of `lapin`, tests use an in-memory broker.
pub mod amqp;

use crate::model::{ConsumerDeclaration, Qos, QueueDeclaration, QueueHandle};
use crate::Result;
use futures::Stream;
use std::future::Future;

/// Creates connections to a broker address.
pub trait Connector: Send + Sync {
    type Connection: Connection;

    fn connect(&self, address: &str) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// A physical connection to the broker.
pub trait Connection: Send + Sync + 'static {
    type Channel: Channel;

    fn open_channel(&self) -> impl Future<Output = Result<Self::Channel>> + Send;

    fn close(&self) -> impl Future<Output = Result<()>> + Send;

    fn is_connected(&self) -> bool;
}

/// A multiplexed channel on a connection.
///
/// Every consumer worker gets a clone of the same channel and handlers may use it concurrently to
/// ack or publish, so implementations need to be safe for concurrent use.
pub trait Channel: Clone + Send + Sync + 'static {
    /// One message delivered to a consumer, with the means to acknowledge it.
    type Delivery: Send + 'static;
    /// The delivery sequence of one consumer. It ends when the channel or the connection is
    /// closed or the broker cancels the consumer.
    type Deliveries: Stream<Item = Result<Self::Delivery>> + Send + Unpin + 'static;

    /// Set prefetch count and size with `global = false`.
    fn basic_qos(&self, qos: &Qos) -> impl Future<Output = Result<()>> + Send;

    fn queue_declare(&self, declaration: &QueueDeclaration) -> impl Future<Output = Result<QueueHandle>> + Send;

    fn basic_consume(
        &self,
        queue_name: &str,
        consumer_tag: &str,
        declaration: &ConsumerDeclaration,
    ) -> impl Future<Output = Result<Self::Deliveries>> + Send;

    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
