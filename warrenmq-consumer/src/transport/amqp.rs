use crate::model::{ConsumerDeclaration, Qos, QueueDeclaration, QueueHandle};
use crate::transport::{Channel, Connection, Connector};
use crate::Result;
use anyhow::anyhow;
use futures::stream::{BoxStream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::ConnectionProperties;
use log::debug;

/// Reply code of a normal connection or channel close.
const REPLY_SUCCESS: u16 = 200;

/// Connects to AMQP 0.9.1 brokers with `lapin`.
#[derive(Clone, Debug, Default)]
pub struct AmqpConnector {
    /// Connection name shown in the management interface of the broker.
    pub connection_name: Option<String>,
}

impl AmqpConnector {
    pub fn with_connection_name(name: &str) -> Self {
        AmqpConnector {
            connection_name: Some(name.to_owned()),
        }
    }
}

pub struct AmqpConnection {
    connection: lapin::Connection,
}

impl Connector for AmqpConnector {
    type Connection = AmqpConnection;

    async fn connect(&self, address: &str) -> Result<AmqpConnection> {
        let mut properties = ConnectionProperties::default();

        if let Some(name) = &self.connection_name {
            properties = properties.with_connection_name(name.clone().into());
        }

        let connection = lapin::Connection::connect(address, properties).await?;

        Ok(AmqpConnection { connection })
    }
}

impl Connection for AmqpConnection {
    type Channel = lapin::Channel;

    async fn open_channel(&self) -> Result<lapin::Channel> {
        Ok(self.connection.create_channel().await?)
    }

    async fn close(&self) -> Result<()> {
        Ok(self.connection.close(REPLY_SUCCESS, "Normal close").await?)
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }
}

impl Channel for lapin::Channel {
    type Delivery = Delivery;
    type Deliveries = BoxStream<'static, Result<Delivery>>;

    async fn basic_qos(&self, qos: &Qos) -> Result<()> {
        let (prefetch_count, options) = qos_options(qos)?;

        Ok(lapin::Channel::basic_qos(self, prefetch_count, options).await?)
    }

    async fn queue_declare(&self, declaration: &QueueDeclaration) -> Result<QueueHandle> {
        let options = declare_options(declaration);
        let queue = lapin::Channel::queue_declare(self, &declaration.name, options, FieldTable::default()).await?;

        debug!("Queue declared {:?}", queue);

        Ok(QueueHandle {
            name: queue.name().as_str().to_owned(),
            message_count: queue.message_count(),
            consumer_count: queue.consumer_count(),
        })
    }

    async fn basic_consume(
        &self,
        queue_name: &str,
        consumer_tag: &str,
        declaration: &ConsumerDeclaration,
    ) -> Result<Self::Deliveries> {
        let options = consume_options(declaration);
        let consumer =
            lapin::Channel::basic_consume(self, queue_name, consumer_tag, options, FieldTable::default()).await?;

        Ok(consumer.map(|delivery| delivery.map_err(anyhow::Error::from)).boxed())
    }

    async fn close(&self) -> Result<()> {
        Ok(lapin::Channel::close(self, REPLY_SUCCESS, "Normal close").await?)
    }
}

/// Prefetch count and options of `basic.qos`. Limits are set per consumer.
///
/// `lapin` cannot send a prefetch size and RabbitMQ refuses non-zero sizes, so they are rejected
/// instead of being applied silently without the limit.
fn qos_options(qos: &Qos) -> Result<(u16, BasicQosOptions)> {
    if qos.prefetch_size != 0 {
        return Err(anyhow!("prefetch size {} is not supported", qos.prefetch_size));
    }

    Ok((qos.prefetch_count, BasicQosOptions { global: false }))
}

fn declare_options(declaration: &QueueDeclaration) -> QueueDeclareOptions {
    QueueDeclareOptions {
        passive: false,
        durable: declaration.durable,
        exclusive: declaration.exclusive,
        auto_delete: declaration.auto_delete,
        nowait: declaration.no_wait,
    }
}

fn consume_options(declaration: &ConsumerDeclaration) -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_local: declaration.no_local,
        no_ack: declaration.auto_ack,
        exclusive: declaration.exclusive,
        nowait: declaration.no_wait,
    }
}
