//! Queue registry, the queues declared by a broker keyed by their logical ids.
use crate::broker_error;
use crate::error::{BrokerError, ErrorKind};
use crate::model::{QueueDeclaration, QueueHandle};
use crate::transport::Channel;
use crate::Result;
use log::{info, warn};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: HashMap<String, QueueHandle>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a queue on the channel and register the result under `id`.
    ///
    /// Declaring the same id again overwrites the previous entry.
    pub async fn declare<Ch: Channel>(
        &mut self,
        channel: &Ch,
        id: &str,
        declaration: &QueueDeclaration,
    ) -> Result<QueueHandle> {
        let queue = channel
            .queue_declare(declaration)
            .await
            .map_err(|e| BrokerError::new(ErrorKind::Declare, Some(id), "queue declare failed").wrap(e))?;

        info!(
            "Queue {} declared as {} messages {} consumers {}",
            id, queue.name, queue.message_count, queue.consumer_count
        );

        if let Some(previous) = self.queues.insert(id.to_owned(), queue.clone()) {
            warn!("Queue id {} declared again, previous queue {} is replaced", id, previous.name);
        }

        Ok(queue)
    }

    /// Get the transport name of the queue declared with the logical id.
    pub fn resolve(&self, id: &str) -> Result<&str> {
        match self.queues.get(id) {
            Some(queue) => Ok(&queue.name),
            None => broker_error!(ErrorKind::NotFound, Some(id), "no queue is declared with this id"),
        }
    }

    pub fn get(&self, id: &str) -> Option<&QueueHandle> {
        self.queues.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueueHandle)> {
        self.queues.iter()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
