use serde_derive::Deserialize;
use std::collections::BTreeMap;

/// Prefetch settings of the channel. They are applied per consumer (`global = false`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Qos {
    /// Maximum number of unacked deliveries the broker pushes to a consumer, 0 means no limit.
    #[serde(default)]
    pub prefetch_count: u16,
    /// Maximum size of the unacked deliveries in bytes, 0 means no limit.
    #[serde(default)]
    pub prefetch_size: u32,
}

impl Qos {
    pub fn new(prefetch_count: u16, prefetch_size: u32) -> Self {
        Qos {
            prefetch_count,
            prefetch_size,
        }
    }
}

/// Properties of a queue to be declared. The logical id of the queue is not part of the
/// declaration, it is the key under which the declaration is registered.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct QueueDeclaration {
    /// The name of the queue in the broker.
    pub name: String,
    /// Durable queue remains active when server restarts.
    #[serde(default)]
    pub durable: bool,
    /// Queue is deleted when all consumers cancelled on it.
    #[serde(default)]
    pub auto_delete: bool,
    /// Exclusive queues can be accessed by the declaring connection.
    #[serde(default)]
    pub exclusive: bool,
    /// Don't wait for the declare-ok answer of the broker.
    #[serde(default)]
    pub no_wait: bool,
}

impl QueueDeclaration {
    pub fn new(name: &str) -> Self {
        QueueDeclaration {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn durable(mut self, value: bool) -> Self {
        self.durable = value;
        self
    }

    pub fn auto_delete(mut self, value: bool) -> Self {
        self.auto_delete = value;
        self
    }

    pub fn exclusive(mut self, value: bool) -> Self {
        self.exclusive = value;
        self
    }

    pub fn no_wait(mut self, value: bool) -> Self {
        self.no_wait = value;
        self
    }
}

/// A queue confirmed by the broker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueHandle {
    /// The name the broker declared, it can differ from the requested one if that was empty.
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

/// The queue a consumer reads from.
///
/// In configuration files it is written as `queue = { name = "orders_queue" }` or as
/// `queue = { id = "orders" }`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub enum QueueRef {
    /// The name of the queue in the broker.
    #[serde(rename = "name")]
    Literal(String),
    /// The logical id of a queue declared by the same broker. It is resolved when the consumer
    /// is bound.
    #[serde(rename = "id")]
    ByLogicalId(String),
}

impl Default for QueueRef {
    fn default() -> Self {
        QueueRef::Literal(String::new())
    }
}

/// Properties of a consumer to be bound to a queue.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ConsumerDeclaration {
    /// Consumer tag. If it is empty, an unique tag will be generated.
    #[serde(default)]
    pub name: String,
    pub queue: QueueRef,
    /// The broker considers messages acked as soon as they are delivered.
    #[serde(default)]
    pub auto_ack: bool,
    /// No other consumer can consume the queue.
    #[serde(default)]
    pub exclusive: bool,
    /// The broker doesn't deliver messages published on the same connection.
    #[serde(default)]
    pub no_local: bool,
    #[serde(default)]
    pub no_wait: bool,
}

impl ConsumerDeclaration {
    pub fn new(name: &str, queue: QueueRef) -> Self {
        ConsumerDeclaration {
            name: name.to_owned(),
            queue,
            ..Default::default()
        }
    }

    pub fn auto_ack(mut self, value: bool) -> Self {
        self.auto_ack = value;
        self
    }

    pub fn exclusive(mut self, value: bool) -> Self {
        self.exclusive = value;
        self
    }

    pub fn no_local(mut self, value: bool) -> Self {
        self.no_local = value;
        self
    }

    pub fn no_wait(mut self, value: bool) -> Self {
        self.no_wait = value;
        self
    }
}

/// Everything a broker needs to be set up: where to connect, the prefetch settings and the
/// queues and consumers keyed by their logical ids.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Topology {
    pub address: String,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default)]
    pub queues: BTreeMap<String, QueueDeclaration>,
    #[serde(default)]
    pub consumers: BTreeMap<String, ConsumerDeclaration>,
}

impl Topology {
    pub fn new(address: &str, qos: Qos) -> Self {
        Topology {
            address: address.to_owned(),
            qos,
            ..Default::default()
        }
    }

    pub fn queue(mut self, id: &str, declaration: QueueDeclaration) -> Self {
        self.queues.insert(id.to_owned(), declaration);
        self
    }

    pub fn consumer(mut self, id: &str, declaration: ConsumerDeclaration) -> Self {
        self.consumers.insert(id.to_owned(), declaration);
        self
    }
}
