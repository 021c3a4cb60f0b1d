//! Dispatch scheduler, one worker task per consumer.
//!
//! A worker takes the next delivery from the stream of its consumer and waits until the handler
//! finishes with it before taking the next one, so deliveries of a consumer are handled in the
//! order they arrived. Workers of different consumers run independently of each other.
//!
//! ```text
//!   Broker              Worker (consumer A)            Handler A
//!     |   delivery 1          |                            |
//!     |---------------------->|   (channel, delivery 1)    |
//!     |   delivery 2          |--------------------------->|
//!     |---------------------->|                            | ack
//!     |                       |<---------------------------|
//!     |                       |   (channel, delivery 2)    |
//!     |                       |--------------------------->|
//!     |   channel closed      |                            |
//!     |---------------------->| worker exits               |
//! ```
use crate::consumer::ConsumerHandle;
use crate::transport::Channel;
use futures::{FutureExt, StreamExt};
use log::{debug, error, info, trace, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;

/// How a worker finished.
#[derive(Debug, PartialEq, Eq)]
enum WorkerExit {
    /// The delivery stream has been closed.
    StreamClosed,
    /// The stream returned an error, it is handled like a closed stream.
    StreamFailed,
    /// The handler panicked, the consumer doesn't get more deliveries.
    HandlerPanicked,
}

/// Start a worker for every consumer and wait until all of them are finished.
///
/// Workers finish when their delivery streams are closed, which normally happens when the channel
/// or the connection is closed. A panicking handler stops only its own worker.
pub async fn run<Ch: Channel>(channel: &Ch, consumers: Vec<ConsumerHandle<Ch>>) {
    let mut workers = JoinSet::new();

    info!("Starting {} consumer workers", consumers.len());

    for consumer in consumers {
        let channel = channel.clone();

        workers.spawn(async move {
            let id = consumer.id.clone();
            let exit = consume_loop(channel, consumer).await;

            (id, exit)
        });
    }

    while let Some(result) = workers.join_next().await {
        match result {
            Ok((id, exit)) => debug!("Worker of consumer {} exited with {:?}", id, exit),
            Err(e) => error!("Consumer worker failed {:?}", e),
        }
    }

    info!("All consumer workers are finished");
}

async fn consume_loop<Ch: Channel>(channel: Ch, consumer: ConsumerHandle<Ch>) -> WorkerExit {
    let ConsumerHandle {
        id,
        consumer_tag,
        mut deliveries,
        handler,
        ..
    } = consumer;
    let mut handled = 0u64;

    let exit = loop {
        match deliveries.next().await {
            Some(Ok(delivery)) => {
                trace!("Consumer {} got delivery #{}", id, handled + 1);

                let handling = AssertUnwindSafe(async { handler.call(channel.clone(), delivery).await });

                if let Err(panic) = handling.catch_unwind().await {
                    error!(
                        "Handler of consumer {} panicked: {}, consumer is stopped",
                        id,
                        panic_message(panic.as_ref())
                    );

                    break WorkerExit::HandlerPanicked;
                }

                handled += 1;
            }
            Some(Err(e)) => {
                warn!("Delivery stream of consumer {} failed {:?}", id, e);

                break WorkerExit::StreamFailed;
            }
            None => break WorkerExit::StreamClosed,
        }
    };

    info!(
        "Consumer {} tag {} stopped after {} deliveries",
        id, consumer_tag, handled
    );

    exit
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
