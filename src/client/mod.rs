//! Minimal MongoDB client
//!
//! One connection per operation: connect, TLS handshake when configured,
//! `hello`, the command itself, then close. No pooling, no monitoring, no
//! authentication.

pub mod address;
pub mod reply;
pub mod settings;

pub use address::{DEFAULT_HOST, DEFAULT_PORT, ServerAddress};
pub use reply::{DatabaseEntry, HelloReply, MIN_WIRE_VERSION};
pub use settings::{CONNECT_TIMEOUT, ClientSettings};

use crate::{
    tls::{TlsMetadata, build_client_config},
    uri::ConnectionString,
    wire::{COMMAND_NOT_FOUND, CommandError, Transport, run_command},
};
use anyhow::{Context, Result};
use bson::{Document, doc};
use reply::ListDatabasesReply;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// A handle to one MongoDB server
#[derive(Debug)]
pub struct Client {
    settings: ClientSettings,
    last_tls: Mutex<Option<TlsMetadata>>,
}

impl Client {
    /// Parse `uri` into settings; no connection is made
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid
    pub fn with_uri_str(uri: &str) -> Result<Self> {
        let parsed: ConnectionString = uri.parse()?;
        Ok(Self::with_settings(parsed.into_settings()))
    }

    /// Wrap `settings`; no connection is made
    #[must_use]
    pub fn with_settings(settings: ClientSettings) -> Self {
        Self {
            settings,
            last_tls: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// TLS details of the last successful encrypted connection
    #[must_use]
    pub fn tls_metadata(&self) -> Option<TlsMetadata> {
        self.last_tls.lock().ok().and_then(|guard| guard.clone())
    }

    /// Names of all databases, in server order
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached, the TLS handshake
    /// fails, or the server rejects the command
    pub async fn list_database_names(&self) -> Result<Vec<String>> {
        let reply = self
            .run_command(doc! { "listDatabases": 1, "nameOnly": true, "$db": "admin" })
            .await?;

        let reply: ListDatabasesReply =
            bson::from_document(reply).context("unexpected listDatabases reply")?;

        Ok(reply.databases.into_iter().map(|db| db.name).collect())
    }

    /// Run `command` (which must carry `$db`) on a fresh connection
    ///
    /// # Errors
    ///
    /// Returns an error if connecting fails, or a [`CommandError`] if the
    /// server rejects the command
    #[instrument(skip_all, fields(server = %self.settings.address))]
    pub async fn run_command(&self, command: Document) -> Result<Document> {
        let mut transport = self.connect().await?;

        // closed on every path, so TLS peers always get a close_notify
        let result = self.exchange(&mut transport, command).await;

        if let Err(err) = transport.shutdown().await {
            debug!(error = %err, "connection shutdown failed");
        }

        result
    }

    async fn exchange(&self, transport: &mut Transport, command: Document) -> Result<Document> {
        let hello = self.handshake(transport).await?;
        debug!(
            max_wire_version = hello.max_wire_version,
            primary = hello.is_primary(),
            "server handshake complete"
        );

        run_command(transport, command).await
    }

    async fn connect(&self) -> Result<Transport> {
        let address = &self.settings.address;

        let tls = match &self.settings.tls {
            Some(tls) => Some(Arc::new(build_client_config(tls, &address.host).await?)),
            None => None,
        };

        let transport = Transport::connect(address, tls, self.settings.connect_timeout).await?;

        if let Some(metadata) = transport.tls_metadata()
            && let Ok(mut last) = self.last_tls.lock()
        {
            *last = Some(metadata);
        }

        Ok(transport)
    }

    /// `hello`, or `isMaster` for servers that predate it
    async fn handshake(&self, transport: &mut Transport) -> Result<HelloReply> {
        let reply = match run_command(transport, self.hello_command("hello")).await {
            Ok(reply) => reply,
            Err(err)
                if err
                    .downcast_ref::<CommandError>()
                    .is_some_and(|e| e.code == COMMAND_NOT_FOUND) =>
            {
                debug!("server does not know hello, retrying with isMaster");
                run_command(transport, self.hello_command("isMaster")).await?
            }
            Err(err) => return Err(err.context("server handshake failed")),
        };

        let hello: HelloReply =
            bson::from_document(reply).context("unexpected hello reply")?;

        if !hello.supports_op_msg() {
            anyhow::bail!(
                "server wire version {} is too old, {MIN_WIRE_VERSION} or later is required",
                hello.max_wire_version
            );
        }

        Ok(hello)
    }

    fn hello_command(&self, name: &str) -> Document {
        let mut client = doc! {
            "driver": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "os": {
                "type": std::env::consts::OS,
                "architecture": std::env::consts::ARCH,
            },
        };
        if let Some(app_name) = &self.settings.app_name {
            client.insert("application", doc! { "name": app_name.as_str() });
        }

        let mut command = Document::new();
        command.insert(name, 1_i32);
        command.insert("client", client);
        command.insert("$db", "admin");
        command
    }
}
