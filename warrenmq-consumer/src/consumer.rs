//! Consumer registry, it binds consumers to queues and keeps their delivery streams together with
//! the handlers until dispatch starts.
use crate::broker_error;
use crate::error::{BrokerError, ErrorKind};
use crate::model::{ConsumerDeclaration, QueueRef};
use crate::queue::QueueRegistry;
use crate::transport::Channel;
use crate::Result;
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The future a handler returns for one delivery.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Function handling the deliveries of a consumer. It gets the shared channel to ack, reject or
/// publish messages.
pub type HandlerFn<Ch> = dyn Fn(Ch, <Ch as Channel>::Delivery) -> HandlerFuture + Send + Sync;

/// A cloneable handler of deliveries.
///
/// The handler doesn't return anything, errors should be signalled towards the broker, e.g. by
/// nacking the message. If it panics, its consumer stops receiving messages.
pub struct Handler<Ch: Channel>(Arc<HandlerFn<Ch>>);

impl<Ch: Channel> Handler<Ch> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Ch, Ch::Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Handler(Arc::new(move |channel: Ch, delivery: Ch::Delivery| -> HandlerFuture {
            Box::pin(f(channel, delivery))
        }))
    }

    pub(crate) fn call(&self, channel: Ch, delivery: Ch::Delivery) -> HandlerFuture {
        (self.0)(channel, delivery)
    }
}

impl<Ch: Channel> Clone for Handler<Ch> {
    fn clone(&self) -> Self {
        Handler(self.0.clone())
    }
}

impl<Ch: Channel> fmt::Debug for Handler<Ch> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// A consumer bound to a queue, waiting for the dispatch to start.
pub struct ConsumerHandle<Ch: Channel> {
    pub(crate) id: String,
    pub(crate) consumer_tag: String,
    pub(crate) queue_name: String,
    pub(crate) deliveries: Ch::Deliveries,
    pub(crate) handler: Handler<Ch>,
}

impl<Ch: Channel> ConsumerHandle<Ch> {
    /// Logical id of the consumer.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl<Ch: Channel> fmt::Debug for ConsumerHandle<Ch> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("id", &self.id)
            .field("consumer_tag", &self.consumer_tag)
            .field("queue_name", &self.queue_name)
            .finish()
    }
}

pub struct ConsumerRegistry<Ch: Channel> {
    consumers: HashMap<String, ConsumerHandle<Ch>>,
}

impl<Ch: Channel> Default for ConsumerRegistry<Ch> {
    fn default() -> Self {
        ConsumerRegistry {
            consumers: HashMap::new(),
        }
    }
}

impl<Ch: Channel> ConsumerRegistry<Ch> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start consuming the queue of the declaration and register the delivery stream together
    /// with the handler under `id`.
    ///
    /// Queue references by logical id are resolved from `queues`, if it is not there, no consume
    /// request is sent. Registering the same id again drops the previously bound consumer.
    pub async fn register(
        &mut self,
        channel: &Ch,
        queues: &QueueRegistry,
        id: &str,
        declaration: &ConsumerDeclaration,
        handler: Handler<Ch>,
    ) -> Result<()> {
        let queue_name = match &declaration.queue {
            QueueRef::Literal(name) => name.clone(),
            QueueRef::ByLogicalId(queue_id) => match queues.get(queue_id) {
                Some(queue) => queue.name.clone(),
                None => {
                    return broker_error!(
                        ErrorKind::Bind,
                        Some(id),
                        format!("queue id {} is not declared", queue_id)
                    );
                }
            },
        };

        let consumer_tag = if declaration.name.is_empty() {
            format!("warrenmq-{}", rand::random::<u64>())
        } else {
            declaration.name.clone()
        };

        let deliveries = channel
            .basic_consume(&queue_name, &consumer_tag, declaration)
            .await
            .map_err(|e| BrokerError::new(ErrorKind::Bind, Some(id), "consume request failed").wrap(e))?;

        info!(
            "Consumer {} tag {} consumes queue {} auto ack {}",
            id, consumer_tag, queue_name, declaration.auto_ack
        );

        let consumer = ConsumerHandle {
            id: id.to_owned(),
            consumer_tag,
            queue_name,
            deliveries,
            handler,
        };

        if let Some(previous) = self.consumers.insert(id.to_owned(), consumer) {
            warn!(
                "Consumer id {} registered again, previous consumer {} is dropped",
                id, previous.consumer_tag
            );
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ConsumerHandle<Ch>> {
        self.consumers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.consumers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Give up the consumers, each of them will be owned by a dispatch worker.
    pub fn into_handles(self) -> Vec<ConsumerHandle<Ch>> {
        self.consumers.into_values().collect()
    }
}
