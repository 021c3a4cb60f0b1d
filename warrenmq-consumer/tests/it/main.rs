//! Tests against a running AMQP broker on localhost:5672 with the default guest user.
#![cfg(feature = "integration-tests")]

mod consume;
mod helper;
