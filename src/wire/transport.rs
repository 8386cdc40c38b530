use super::{Message, OpMsgCodec};
use crate::{
    client::ServerAddress,
    tls::{TlsMetadata, handshake},
};
use anyhow::{Context, Result, anyhow};
use futures::{SinkExt, StreamExt};
use rustls::ClientConfig;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpStream, time::timeout};
use tokio_rustls::client::TlsStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

/// A connection to one server, plain or TLS-encrypted, framed as `OP_MSG`
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    Plain(Framed<TcpStream, OpMsgCodec>),
    Tls(Framed<TlsStream<TcpStream>, OpMsgCodec>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Self::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
        }
    }
}

impl Transport {
    /// Open a TCP connection to `address`, then run the TLS handshake when a
    /// client configuration is given
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails or exceeds `connect_timeout`
    #[instrument(skip(tls), fields(encrypted = tls.is_some()))]
    pub async fn connect(
        address: &ServerAddress,
        tls: Option<Arc<ClientConfig>>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        timeout(connect_timeout, Self::open(address, tls))
            .await
            .with_context(|| format!("timed out connecting to {address} after {connect_timeout:?}"))?
    }

    async fn open(address: &ServerAddress, tls: Option<Arc<ClientConfig>>) -> Result<Self> {
        let stream = TcpStream::connect((address.host.as_str(), address.port))
            .await
            .with_context(|| format!("failed to connect to {address}"))?;
        stream.set_nodelay(true)?;

        match tls {
            Some(config) => {
                let stream = handshake(config, &address.host, stream).await?;
                debug!(server = %address, "TLS handshake complete");
                Ok(Self::Tls(Framed::new(stream, OpMsgCodec)))
            }
            None => Ok(Self::Plain(Framed::new(stream, OpMsgCodec))),
        }
    }

    /// Negotiated TLS details, `None` for plain connections
    #[must_use]
    pub fn tls_metadata(&self) -> Option<TlsMetadata> {
        match self {
            Self::Plain(_) => None,
            Self::Tls(framed) => {
                let (_tcp, connection) = framed.get_ref().get_ref();
                Some(TlsMetadata::from_connection(connection))
            }
        }
    }

    /// Send `message` and flush it
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded or written
    pub async fn send(&mut self, message: Message) -> Result<()> {
        let sent = match self {
            Self::Plain(framed) => framed.send(message).await,
            Self::Tls(framed) => framed.send(message).await,
        };
        sent.context("failed to send message")
    }

    /// Receive the next message
    ///
    /// # Errors
    ///
    /// Returns an error if the connection closes or the reply is malformed
    pub async fn receive(&mut self) -> Result<Message> {
        let next = match self {
            Self::Plain(framed) => framed.next().await,
            Self::Tls(framed) => framed.next().await,
        };

        next.ok_or_else(|| anyhow!("connection closed before a reply arrived"))?
            .context("failed to read reply")
    }

    /// Send `request` and wait for the reply that answers it
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or when the reply answers another request
    pub async fn round_trip(&mut self, request: Message) -> Result<Message> {
        let request_id = request.request_id;
        self.send(request).await?;
        let reply = self.receive().await?;

        if reply.response_to != request_id {
            anyhow::bail!(
                "reply answers request {} but {request_id} was sent",
                reply.response_to
            );
        }

        Ok(reply)
    }

    /// Close the connection, sending a TLS `close_notify` first when encrypted
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails
    pub async fn shutdown(&mut self) -> Result<()> {
        let closed = match self {
            Self::Plain(framed) => framed.close().await,
            Self::Tls(framed) => framed.close().await,
        };
        closed.context("failed to close connection")
    }
}
