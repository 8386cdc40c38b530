use rustls::{
    SignatureScheme,
    client::ResolvesClientCert,
    pki_types::{CertificateDer, ServerName},
    sign::CertifiedKey,
};
use std::{fmt, sync::Arc};
use tracing::debug;

/// What the server asked for when it requested a client certificate
#[derive(Debug)]
pub struct CertificateRequest<'a> {
    /// Host the connection was opened against
    pub host: &'a str,
    /// DER-encoded distinguished names of issuers the server accepts; may be empty
    pub acceptable_issuers: &'a [&'a [u8]],
    pub signature_schemes: &'a [SignatureScheme],
}

/// The certificate presented by the server, plus the outcome of standard validation
#[derive(Debug)]
pub struct PeerCertificate<'a> {
    pub host: &'a ServerName<'a>,
    pub end_entity: &'a CertificateDer<'a>,
    pub intermediates: &'a [CertificateDer<'a>],
    /// Error reported by WebPKI chain and hostname validation, `None` when valid
    pub policy_error: Option<&'a rustls::Error>,
}

/// Picks the identity to present for a certificate request. `None` continues
/// the handshake without a client certificate.
pub type ClientCertificateSelector =
    Arc<dyn Fn(&CertificateRequest<'_>) -> Option<Arc<CertifiedKey>> + Send + Sync>;

/// Decides whether a server certificate is accepted
pub type ServerCertificateValidator = Arc<dyn Fn(&PeerCertificate<'_>) -> bool + Send + Sync>;

/// Wrap a closure as a [`ClientCertificateSelector`]
pub fn select_with<F>(f: F) -> ClientCertificateSelector
where
    F: Fn(&CertificateRequest<'_>) -> Option<Arc<CertifiedKey>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`ServerCertificateValidator`]
pub fn validate_with<F>(f: F) -> ServerCertificateValidator
where
    F: Fn(&PeerCertificate<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Always present `key`, ignoring the requested issuers and host
#[must_use]
pub fn always_select(key: Arc<CertifiedKey>) -> ClientCertificateSelector {
    select_with(move |_| Some(Arc::clone(&key)))
}

/// Accept any server certificate.
///
/// # Security
///
/// Only meant for local servers running with throwaway certificates: this
/// disables chain, expiry and hostname checks entirely.
#[must_use]
pub fn accept_any() -> ServerCertificateValidator {
    validate_with(|_| true)
}

/// `ResolvesClientCert` backed by a [`ClientCertificateSelector`]
pub struct SelectorResolver {
    host: String,
    selector: ClientCertificateSelector,
}

impl fmt::Debug for SelectorResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorResolver")
            .field("host", &self.host)
            .field("selector", &"<hook>")
            .finish()
    }
}

impl SelectorResolver {
    #[must_use]
    pub fn new(host: impl Into<String>, selector: ClientCertificateSelector) -> Self {
        Self {
            host: host.into(),
            selector,
        }
    }
}

impl ResolvesClientCert for SelectorResolver {
    fn resolve(
        &self,
        root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        let request = CertificateRequest {
            host: &self.host,
            acceptable_issuers: root_hint_subjects,
            signature_schemes: sigschemes,
        };

        let selected = (self.selector)(&request);
        debug!(
            host = %self.host,
            issuers = root_hint_subjects.len(),
            selected = selected.is_some(),
            "client certificate requested"
        );
        selected
    }

    fn has_certs(&self) -> bool {
        true
    }
}
