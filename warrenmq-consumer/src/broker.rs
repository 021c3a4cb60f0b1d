//! Lifecycle of a broker: connect, declare the queues, bind the consumers, dispatch, close.
use crate::broker_error;
use crate::connection::{self, BrokerHandle};
use crate::consumer::{ConsumerRegistry, Handler};
use crate::dispatch;
use crate::error::ErrorKind;
use crate::model::{ConsumerDeclaration, Qos, QueueDeclaration, QueueHandle, Topology};
use crate::queue::QueueRegistry;
use crate::transport::{Connection, Connector};
use crate::Result;
use log::{error, info, warn};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Handlers of the consumers keyed by the logical consumer ids.
pub type HandlerMap<Ch> = HashMap<String, Handler<Ch>>;

/// A broker connection with its declared queues and bound consumers.
///
/// Setup operations need exclusive access, after that the broker can be shared (e.g. in an
/// `Arc`), so one task can [`run`][Broker::run] it while others can [`close`][Broker::close] it or
/// check its health.
pub struct Broker<C: Connection> {
    handle: BrokerHandle<C>,
    queues: QueueRegistry,
    /// Consumers waiting for the dispatch. `run` takes them out, after that it is `None`.
    consumers: Mutex<Option<ConsumerRegistry<C::Channel>>>,
}

impl<C: Connection> Broker<C> {
    /// Open a connection and a channel with the prefetch settings, without declaring anything.
    pub async fn open<K>(connector: &K, address: &str, qos: &Qos) -> Result<Self>
    where
        K: Connector<Connection = C>,
    {
        let handle = connection::open(connector, address, qos).await?;

        Ok(Broker {
            handle,
            queues: QueueRegistry::new(),
            consumers: Mutex::new(Some(ConsumerRegistry::new())),
        })
    }

    /// Open the broker and set up the whole topology: declare all the queues and bind all the
    /// consumers with their handlers.
    ///
    /// Every declared consumer needs to have a handler, it is checked before any consumer is
    /// bound. If any step fails, the connection is closed and the error is returned.
    pub async fn start<K>(connector: &K, topology: &Topology, handlers: HandlerMap<C::Channel>) -> Result<Self>
    where
        K: Connector<Connection = C>,
    {
        let mut broker = Self::open(connector, &topology.address, &topology.qos).await?;

        if let Err(e) = broker.set_up(topology, handlers).await {
            error!("Broker setup failed {:#}", e);

            broker.close().await;

            return Err(e);
        }

        Ok(broker)
    }

    async fn set_up(&mut self, topology: &Topology, mut handlers: HandlerMap<C::Channel>) -> Result<()> {
        for (id, declaration) in &topology.queues {
            self.declare_queue(id, declaration).await?;
        }

        let mut bindings = Vec::with_capacity(topology.consumers.len());

        for (id, declaration) in &topology.consumers {
            match handlers.remove(id) {
                Some(handler) => bindings.push((id, declaration, handler)),
                None => {
                    return broker_error!(
                        ErrorKind::MissingHandler,
                        Some(id.as_str()),
                        "missing handler for declared consumer id"
                    );
                }
            }
        }

        for id in handlers.keys() {
            warn!("Handler {} doesn't belong to any declared consumer", id);
        }

        for (id, declaration, handler) in bindings {
            self.register_consumer(id, declaration, handler).await?;
        }

        Ok(())
    }

    /// Declare a queue and register it with the logical id.
    pub async fn declare_queue(&mut self, id: &str, declaration: &QueueDeclaration) -> Result<QueueHandle> {
        if self.handle.is_closed() {
            return broker_error!(ErrorKind::Lifecycle, Some(id), "broker is closed");
        }

        self.queues.declare(self.handle.channel(), id, declaration).await
    }

    /// Bind a consumer to its queue and register it with the handler. It is possible only before
    /// the dispatch is started.
    pub async fn register_consumer(
        &mut self,
        id: &str,
        declaration: &ConsumerDeclaration,
        handler: Handler<C::Channel>,
    ) -> Result<()> {
        if self.handle.is_closed() {
            return broker_error!(ErrorKind::Lifecycle, Some(id), "broker is closed");
        }

        match self.consumers.get_mut() {
            Some(consumers) => {
                consumers
                    .register(self.handle.channel(), &self.queues, id, declaration, handler)
                    .await
            }
            None => broker_error!(ErrorKind::Lifecycle, Some(id), "dispatch is already started"),
        }
    }

    /// Dispatch the deliveries to the handlers of the consumers. It returns when all the delivery
    /// streams are closed, which happens when the broker is closed or the connection is lost.
    ///
    /// Handler panics don't make it fail, it fails only if the broker is already closed or it is
    /// already running.
    pub async fn run(&self) -> Result<()> {
        if self.handle.is_closed() {
            return broker_error!(ErrorKind::Lifecycle, None, "broker is closed");
        }

        let consumers = match self.consumers.lock().await.take() {
            Some(consumers) => consumers,
            None => return broker_error!(ErrorKind::Lifecycle, None, "dispatch is already started"),
        };

        if consumers.is_empty() {
            warn!("No consumers are registered");
        }

        dispatch::run(self.handle.channel(), consumers.into_handles()).await;

        info!("Dispatch is finished");

        Ok(())
    }

    /// Close the channel and the connection. It can be called any time and any number of times.
    pub async fn close(&self) {
        self.handle.close().await;
    }

    /// Checks if the broker is open and its connection is alive.
    pub fn health_check(&self) -> Result<()> {
        if self.handle.is_closed() {
            return broker_error!(ErrorKind::Lifecycle, None, "broker is closed");
        }

        if !self.handle.is_connected() {
            return broker_error!(ErrorKind::Connection, None, "connection is lost");
        }

        Ok(())
    }

    pub fn queue(&self, id: &str) -> Option<&QueueHandle> {
        self.queues.get(id)
    }

    /// Get the transport name of a queue by its logical id.
    pub fn resolve(&self, id: &str) -> Result<&str> {
        self.queues.resolve(id)
    }

    pub fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    pub fn channel(&self) -> &C::Channel {
        self.handle.channel()
    }

    pub fn address(&self) -> &str {
        self.handle.address()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
