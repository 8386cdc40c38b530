use anyhow::{Result, anyhow};
use chrono::Utc;
use rustls::{ClientConnection, ProtocolVersion};
use x509_parser::prelude::{FromDer, X509Certificate};

/// TLS connection metadata extracted after handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMetadata {
    /// TLS protocol version (e.g., "TLSv1.3")
    pub version: Option<String>,
    /// Cipher suite used (e.g., `TLS13_AES_256_GCM_SHA384`)
    pub cipher: Option<String>,
    /// Certificate subject DN
    pub cert_subject: Option<String>,
    /// Certificate issuer DN
    pub cert_issuer: Option<String>,
    /// Days until certificate expiration (negative if expired)
    pub cert_expiry_days: Option<i64>,
}

impl TlsMetadata {
    /// Collect what the handshake negotiated, plus details of the peer's leaf certificate
    #[must_use]
    pub fn from_connection(connection: &ClientConnection) -> Self {
        let version = connection.protocol_version().map(version_name);
        let cipher = connection
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite()));

        let peer = connection
            .peer_certificates()
            .and_then(<[_]>::first)
            .and_then(|cert| extract_cert_metadata(cert.as_ref()).ok())
            .unwrap_or_default();

        Self {
            version,
            cipher,
            ..peer
        }
    }
}

fn version_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{other:?}"),
    }
}

/// Extract certificate metadata (subject, issuer, expiry) from DER-encoded certificate
///
/// # Errors
///
/// Returns an error if the certificate cannot be parsed
pub fn extract_cert_metadata(cert_der: &[u8]) -> Result<TlsMetadata> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| anyhow!("failed to parse certificate: {e}"))?;

    let raw = cert.validity().not_after.to_datetime();
    let not_after = chrono::DateTime::<Utc>::from_timestamp(raw.unix_timestamp(), raw.nanosecond())
        .ok_or_else(|| anyhow!("invalid certificate expiry timestamp"))?;
    let remaining = not_after - Utc::now();

    Ok(TlsMetadata {
        cert_subject: Some(cert.subject().to_string()),
        cert_issuer: Some(cert.issuer().to_string()),
        cert_expiry_days: Some(remaining.num_days()),
        ..Default::default()
    })
}
