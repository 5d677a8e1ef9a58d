//! Broker clients used by the client groups.
//!
//! The load harness only needs to connect, publish and close;
//! wire protocols live entirely behind these traits.

use rama::error::BoxError;

mod tcp;
pub use self::tcp::TcpBroker;

#[cfg(feature = "kafka")]
mod kafka;
#[cfg(feature = "kafka")]
pub use self::kafka::KafkaBroker;

#[cfg(test)]
pub(crate) mod mock;

/// Factory of broker connections.
pub trait Broker: Send + Sync + 'static {
    type Connection: Connection;

    /// Establish a connection to (one of) the given broker addresses.
    ///
    /// `client_id` is used for diagnostics only.
    fn connect(
        &self,
        client_id: &str,
        addresses: &[String],
    ) -> impl Future<Output = Result<Self::Connection, BoxError>> + Send;
}

/// A single broker connection, shared by all lanes of one client group.
pub trait Connection: Send + Sync + 'static {
    /// Publish one message and resolve once the broker acknowledged it.
    fn send(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Release the connection. Called exactly once, by the owning client group.
    fn close(&self) -> impl Future<Output = Result<(), BoxError>> + Send;
}
