use super::{
    ClientIdentity, SelectorResolver, SettingsVerifier, TlsSettings, always_select,
    load_root_store,
};
use anyhow::{Context, Result, anyhow};
use rustls::{ClientConfig, RootCertStore, crypto::CryptoProvider, pki_types::ServerName};
use std::{
    net::IpAddr,
    sync::{Arc, OnceLock},
};
use tokio::net::TcpStream;
use tokio_rustls::{TlsConnector, client::TlsStream};
use tracing::debug;

static CRYPTO_PROVIDER_INIT: OnceLock<()> = OnceLock::new();

/// Ensure the rustls crypto provider is initialized
///
/// This should be called before any TLS operations. It's safe to call
/// multiple times as initialization only happens once.
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.get_or_init(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("a rustls crypto provider was already installed");
        }
    });
}

/// Turn [`TlsSettings`] into a rustls client configuration for `host`
///
/// Reads the CA bundle and client certificate from disk when the settings
/// point at files, so a missing file surfaces here.
///
/// # Errors
///
/// Returns an error if a certificate file cannot be loaded or the settings
/// cannot be expressed as a rustls configuration
pub async fn build_client_config(settings: &TlsSettings, host: &str) -> Result<ClientConfig> {
    ensure_crypto_provider();
    let provider = CryptoProvider::get_default()
        .cloned()
        .ok_or_else(|| anyhow!("no rustls crypto provider installed"))?;

    let roots = match &settings.ca_file {
        Some(path) => load_root_store(path).await?,
        None => webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect::<RootCertStore>(),
    };

    let verifier = SettingsVerifier::new(roots, Arc::clone(&provider), settings)?;

    let builder = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(settings.protocol_versions())
        .map_err(|e| anyhow!("unsupported TLS protocol versions: {e}"))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let config = if let Some(selector) = &settings.client_certificate_selection {
        builder.with_client_cert_resolver(Arc::new(SelectorResolver::new(
            host,
            Arc::clone(selector),
        )))
    } else if let Some(path) = &settings.cert_key_file {
        let identity = ClientIdentity::from_pem_file(path).await?;
        builder.with_client_cert_resolver(Arc::new(SelectorResolver::new(
            host,
            always_select(identity.certified_key()?),
        )))
    } else {
        builder.with_no_client_auth()
    };

    Ok(config)
}

/// Run the TLS handshake over an established TCP stream
///
/// # Errors
///
/// Returns an error if `host` is not a valid server name or the handshake fails
pub async fn handshake(
    config: Arc<ClientConfig>,
    host: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let server_name = server_name_from_host(host)
        .with_context(|| format!("invalid server name for TLS: {host}"))?;

    TlsConnector::from(config)
        .connect(server_name, stream)
        .await
        .with_context(|| format!("TLS handshake with {host} failed"))
}

/// Parse `host` as an IP address or DNS name for SNI and certificate checks
///
/// # Errors
///
/// Returns an error if `host` is neither
pub fn server_name_from_host(host: &str) -> Result<ServerName<'static>> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.parse::<IpAddr>().map_or_else(
        |_| {
            ServerName::try_from(host.to_string())
                .map_err(|_| anyhow!("invalid server name: {host}"))
        },
        |ip| Ok(ServerName::from(ip)),
    )
}
