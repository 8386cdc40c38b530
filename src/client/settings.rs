use super::ServerAddress;
use crate::tls::TlsSettings;
use std::time::Duration;

/// Time allowed for TCP connect plus TLS handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a [`Client`](super::Client) needs to reach a server
///
/// Transport encryption is on when `tls` is `Some`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub address: ServerAddress,
    pub app_name: Option<String>,
    pub tls: Option<TlsSettings>,
    pub connect_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            app_name: None,
            tls: None,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub const fn use_tls(&self) -> bool {
        self.tls.is_some()
    }
}
