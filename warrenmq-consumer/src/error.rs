use std::fmt;

/// Result type of the broker operations. The error part can be downcast to [`BrokerError`] to
/// find out which step of the lifecycle failed.
pub type Result<T> = anyhow::Result<T>;

/// Classification of the errors the dispatch core can return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connecting to the broker or opening the channel failed.
    Connection,
    /// The broker refused the prefetch settings.
    Qos,
    /// A queue declaration was rejected.
    Declare,
    /// A consumer couldn't be bound, the queue reference is unknown or the consume was rejected.
    Bind,
    /// A declared consumer doesn't have a handler.
    MissingHandler,
    /// There is no queue declared with the logical id.
    NotFound,
    /// The operation is not valid in the current state of the broker (closed, already running).
    Lifecycle,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Represents an error of the broker setup or lifecycle. If `id` is `None` the error is not
/// related to a specific queue or consumer.
#[derive(Clone, Debug)]
pub struct BrokerError {
    pub kind: ErrorKind,
    /// Logical id of the queue or consumer in question.
    pub id: Option<String>,
    pub message: String,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} error on {:?}: {}", self.kind, id, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for BrokerError {}

impl BrokerError {
    pub(crate) fn new(kind: ErrorKind, id: Option<&str>, message: &str) -> Self {
        BrokerError {
            kind,
            id: id.map(str::to_owned),
            message: message.to_owned(),
        }
    }

    /// Puts this error as a context on top of a transport error, so the cause is kept in the
    /// chain and the error can still be downcast to `BrokerError`.
    pub(crate) fn wrap(self, cause: anyhow::Error) -> anyhow::Error {
        cause.context(self)
    }
}

/// Shorthand for creating errors in async functions.
#[macro_export]
macro_rules! broker_error {
    ($kind:expr, $id:expr, $message:expr) => {
        ::std::result::Result::Err(::anyhow::Error::new($crate::BrokerError {
            kind: $kind,
            id: $id.map(|id: &str| id.to_owned()),
            message: ::std::string::String::from($message),
        }))
    };
}
