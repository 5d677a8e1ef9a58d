use std::net::SocketAddr;

use rama::{
    error::{BoxError, ErrorContext as _, ErrorExt as _},
    telemetry::tracing,
};
use tokio::{
    io::{AsyncWriteExt as _, BufWriter},
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::Mutex,
};

use super::{Broker, Connection};

/// Raw TCP sink: every message is written as one newline terminated line.
///
/// A message counts as acknowledged once it is flushed to the socket.
/// The topic is not transmitted.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct TcpBroker;

impl TcpBroker {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
pub struct TcpConnection {
    peer: SocketAddr,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
}

impl Broker for TcpBroker {
    type Connection = TcpConnection;

    async fn connect(
        &self,
        client_id: &str,
        addresses: &[String],
    ) -> Result<Self::Connection, BoxError> {
        let mut last_err = None;

        for address in addresses {
            match TcpStream::connect(address.as_str()).await {
                Ok(stream) => {
                    stream.set_nodelay(true).context("set TCP_NODELAY")?;
                    let peer = stream.peer_addr().context("read peer address")?;
                    tracing::debug!(%client_id, %peer, "tcp broker connection established");

                    // the read half is of no use to us, dropping it does not close the stream
                    let (_, writer) = stream.into_split();
                    return Ok(TcpConnection {
                        peer,
                        writer: Mutex::new(BufWriter::new(writer)),
                    });
                }
                Err(err) => {
                    tracing::debug!(%client_id, %address, "tcp broker address unreachable: {err}");
                    last_err = Some(
                        err.context("connect to tcp broker")
                            .context_str_field("address", address.as_str()),
                    );
                }
            }
        }

        Err(last_err.unwrap_or_else(|| BoxError::from("no broker address to connect to")))
    }
}

impl Connection for TcpConnection {
    async fn send(&self, _topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await.context("write payload")?;
        writer.write_all(b"\n").await.context("write delimiter")?;
        writer.flush().await.context("flush payload")?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BoxError> {
        tracing::trace!(peer = %self.peer, "closing tcp broker connection");
        let mut writer = self.writer.lock().await;
        writer.shutdown().await.context("shutdown tcp write half")?;
        Ok(())
    }
}
