use super::{ClientCertificateSelector, ServerCertificateValidator};
use rustls::{
    SupportedProtocolVersion,
    version::{TLS12, TLS13},
};
use std::{fmt, path::PathBuf, str::FromStr};

static TLS12_AND_UP: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&TLS13];

/// Lowest TLS protocol version a connection is allowed to negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TlsVersion {
    #[default]
    Tls12,
    Tls13,
}

impl FromStr for TlsVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let number = lower
            .strip_prefix("tlsv")
            .or_else(|| lower.strip_prefix("tls"))
            .unwrap_or(&lower);

        match number {
            "1.2" => Ok(Self::Tls12),
            "1.3" => Ok(Self::Tls13),
            _ => Err(format!("Invalid TLS version: {s}")),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls12 => write!(f, "TLSv1.2"),
            Self::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

impl TlsVersion {
    /// Protocol versions rustls may offer when `self` is the floor
    #[must_use]
    pub const fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            Self::Tls12 => TLS12_AND_UP,
            Self::Tls13 => TLS13_ONLY,
        }
    }
}

/// TLS options for a MongoDB connection
///
/// Built either from connection string options (`tlsCAFile`,
/// `tlsCertificateKeyFile`, `tlsInsecure`, ...) or directly in code. The two
/// hooks take precedence over the equivalent file/flag options when set:
/// `client_certificate_selection` over `cert_key_file`, and
/// `server_certificate_validation` over both `allow_invalid_*` flags.
#[derive(Clone, Default)]
pub struct TlsSettings {
    pub min_protocol_version: Option<TlsVersion>,
    pub ca_file: Option<PathBuf>,
    pub cert_key_file: Option<PathBuf>,
    pub allow_invalid_certificates: bool,
    pub allow_invalid_hostnames: bool,
    pub client_certificate_selection: Option<ClientCertificateSelector>,
    pub server_certificate_validation: Option<ServerCertificateValidator>,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("min_protocol_version", &self.min_protocol_version)
            .field("ca_file", &self.ca_file)
            .field("cert_key_file", &self.cert_key_file)
            .field("allow_invalid_certificates", &self.allow_invalid_certificates)
            .field("allow_invalid_hostnames", &self.allow_invalid_hostnames)
            .field(
                "client_certificate_selection",
                &self.client_certificate_selection.as_ref().map(|_| "<hook>"),
            )
            .field(
                "server_certificate_validation",
                &self.server_certificate_validation.as_ref().map(|_| "<hook>"),
            )
            .finish()
    }
}

impl TlsSettings {
    #[must_use]
    pub fn protocol_versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        self.min_protocol_version
            .unwrap_or_default()
            .protocol_versions()
    }

    /// True when the server certificate is not checked at all
    #[must_use]
    pub const fn is_insecure(&self) -> bool {
        self.allow_invalid_certificates && self.allow_invalid_hostnames
    }
}
