//! Connection manager, it owns the connection and the single channel of a broker.
use crate::error::{BrokerError, ErrorKind};
use crate::model::Qos;
use crate::transport::{Channel, Connection, Connector};
use crate::Result;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// An open connection with its channel. Queue and consumer operations go through the channel of
/// the handle.
pub struct BrokerHandle<C: Connection> {
    address: String,
    connection: C,
    channel: C::Channel,
    closed: AtomicBool,
}

/// Connect to the broker, open a channel and set the prefetch limits.
///
/// If any of the steps fails, the already opened channel and connection are closed before the
/// error is returned.
pub async fn open<K: Connector>(connector: &K, address: &str, qos: &Qos) -> Result<BrokerHandle<K::Connection>> {
    info!("Connecting to {}", host_part(address));

    let connection = connector
        .connect(address)
        .await
        .map_err(|e| BrokerError::new(ErrorKind::Connection, None, "cannot connect to broker").wrap(e))?;

    let channel = match connection.open_channel().await {
        Ok(channel) => channel,
        Err(e) => {
            close_connection(&connection).await;

            return Err(BrokerError::new(ErrorKind::Connection, None, "cannot open channel").wrap(e));
        }
    };

    if let Err(e) = channel.basic_qos(qos).await {
        close_channel(&channel).await;
        close_connection(&connection).await;

        return Err(BrokerError::new(ErrorKind::Qos, None, "cannot set prefetch").wrap(e));
    }

    info!(
        "Connected to {} prefetch count {} size {}",
        host_part(address),
        qos.prefetch_count,
        qos.prefetch_size
    );

    Ok(BrokerHandle {
        address: address.to_owned(),
        connection,
        channel,
        closed: AtomicBool::new(false),
    })
}

impl<C: Connection> BrokerHandle<C> {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn channel(&self) -> &C::Channel {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.connection.is_connected()
    }

    /// Close the channel and then the connection. Only the first call does anything, failures
    /// are logged and don't stop closing the connection.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Closing connection to {}", host_part(&self.address));

        close_channel(&self.channel).await;
        close_connection(&self.connection).await;
    }
}

async fn close_channel<Ch: Channel>(channel: &Ch) {
    if let Err(e) = channel.close().await {
        warn!("Error closing channel {:?}", e);
    }
}

async fn close_connection<C: Connection>(connection: &C) {
    if let Err(e) = connection.close().await {
        warn!("Error closing connection {:?}", e);
    }
}

/// The address without the user credentials, for logging.
fn host_part(address: &str) -> &str {
    address.rsplit('@').next().unwrap_or(address)
}
