//! Three connection attempts against one server
//!
//! A. TLS connection string with the CA file and `tlsInsecure=true`
//! B. Client settings with a client certificate and permissive hooks
//! C. Plain connection string, whose failure is reported and tolerated
//!
//! A and B abort the run on failure, C never does.

use crate::{
    certs::CertificatePaths,
    client::{Client, ClientSettings, ServerAddress},
    tls::{ClientIdentity, TlsSettings, TlsVersion, accept_any, always_select},
    uri::ConnectionString,
};
use anyhow::{Context, Result};
use std::{fmt, io::Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{Instrument, debug, info, info_span};

pub const EXIT_PROMPT: &str = "Press enter to exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    SslConnectionString,
    ClientSettings,
    PlainConnectionString,
}

impl Procedure {
    pub const ALL: [Self; 3] = [
        Self::SslConnectionString,
        Self::ClientSettings,
        Self::PlainConnectionString,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SslConnectionString => "SSL connection string",
            Self::ClientSettings => "client settings",
            Self::PlainConnectionString => "connection string",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Connected { names: Vec<String> },
    Failed { message: String },
}

impl ConnectionOutcome {
    /// The line printed for this outcome
    #[must_use]
    pub fn report(&self, procedure: Procedure) -> String {
        match self {
            Self::Connected { names } => {
                format!("Connected using {procedure}: {}", names.join(", "))
            }
            Self::Failed { message } => format!("Unable to connect using {procedure}: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Demo {
    address: ServerAddress,
    certs: CertificatePaths,
}

impl Demo {
    #[must_use]
    pub const fn new(address: ServerAddress, certs: CertificatePaths) -> Self {
        Self { address, certs }
    }

    /// Procedure A's connection string
    ///
    /// # Errors
    ///
    /// Returns an error if the CA file path is not valid UTF-8
    pub fn ssl_connection_string(&self) -> Result<String> {
        ConnectionString::tls_descriptor(&self.address, &self.certs.ca_file, true)
    }

    /// Procedure C's connection string
    #[must_use]
    pub fn plain_connection_string(&self) -> String {
        ConnectionString::plain_descriptor(&self.address)
    }

    /// Procedure B's settings: TLS 1.2 or later, the client identity offered
    /// for every certificate request, and any server certificate accepted
    ///
    /// # Errors
    ///
    /// Returns an error if the client certificate file cannot be loaded
    pub async fn client_settings(&self) -> Result<ClientSettings> {
        let identity = ClientIdentity::from_pem_file(&self.certs.client_cert_file).await?;

        Ok(ClientSettings {
            address: self.address.clone(),
            tls: Some(TlsSettings {
                min_protocol_version: Some(TlsVersion::Tls12),
                client_certificate_selection: Some(always_select(identity.certified_key()?)),
                server_certificate_validation: Some(accept_any()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Procedure A
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the listing fails
    pub async fn connect_using_ssl_connection_string(&self) -> Result<Vec<String>> {
        let client = Client::with_uri_str(&self.ssl_connection_string()?)?;
        list_names(&client)
            .instrument(info_span!("attempt", procedure = Procedure::SslConnectionString.label()))
            .await
    }

    /// Procedure B
    ///
    /// # Errors
    ///
    /// Returns an error if the client certificate cannot be loaded, or the
    /// connection or the listing fails
    pub async fn connect_using_client_settings(&self) -> Result<Vec<String>> {
        let client = Client::with_settings(self.client_settings().await?);
        list_names(&client)
            .instrument(info_span!("attempt", procedure = Procedure::ClientSettings.label()))
            .await
    }

    /// Procedure C; failures become [`ConnectionOutcome::Failed`]
    pub async fn connect_using_connection_string(&self) -> ConnectionOutcome {
        let attempt = async {
            let client = Client::with_uri_str(&self.plain_connection_string())?;
            list_names(&client).await
        };

        match attempt
            .instrument(info_span!("attempt", procedure = Procedure::PlainConnectionString.label()))
            .await
        {
            Ok(names) => ConnectionOutcome::Connected { names },
            Err(err) => ConnectionOutcome::Failed {
                message: format!("{err:#}"),
            },
        }
    }

    /// Run A, B and C in order, writing one line per procedure to `out`
    ///
    /// # Errors
    ///
    /// Returns an error as soon as A or B fails, or if `out` cannot be written
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<Vec<(Procedure, ConnectionOutcome)>> {
        let mut outcomes = Vec::with_capacity(Procedure::ALL.len());

        for procedure in Procedure::ALL {
            let outcome = match procedure {
                Procedure::SslConnectionString => ConnectionOutcome::Connected {
                    names: self
                        .connect_using_ssl_connection_string()
                        .await
                        .with_context(|| format!("connection using {procedure} failed"))?,
                },
                Procedure::ClientSettings => ConnectionOutcome::Connected {
                    names: self
                        .connect_using_client_settings()
                        .await
                        .with_context(|| format!("connection using {procedure} failed"))?,
                },
                Procedure::PlainConnectionString => self.connect_using_connection_string().await,
            };

            writeln!(out, "{}", outcome.report(procedure))?;
            out.flush()?;
            outcomes.push((procedure, outcome));
        }

        Ok(outcomes)
    }
}

async fn list_names(client: &Client) -> Result<Vec<String>> {
    let names = client.list_database_names().await?;

    if let Some(tls) = client.tls_metadata() {
        debug!(
            version = tls.version.as_deref().unwrap_or("unknown"),
            cipher = tls.cipher.as_deref().unwrap_or("unknown"),
            subject = tls.cert_subject.as_deref().unwrap_or("unknown"),
            expiry_days = ?tls.cert_expiry_days,
            "negotiated TLS"
        );
    }
    info!(databases = names.len(), "listed databases");

    Ok(names)
}

/// Print [`EXIT_PROMPT`] and wait for one line (or end of input)
///
/// # Errors
///
/// Returns an error if writing the prompt or reading input fails
pub async fn wait_for_enter<W, R>(out: &mut W, input: &mut R) -> Result<()>
where
    W: Write,
    R: AsyncBufRead + Unpin,
{
    writeln!(out, "{EXIT_PROMPT}")?;
    out.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .await
        .context("failed to read from standard input")?;
    Ok(())
}
