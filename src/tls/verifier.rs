use super::{PeerCertificate, ServerCertificateValidator, TlsSettings};
use anyhow::{Result, anyhow};
use rustls::{
    CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

/// Server certificate verifier driven by [`TlsSettings`]
///
/// Standard WebPKI validation always runs first so its verdict can be handed
/// to a validation hook. The verdict is then settled in this order:
///
/// 1. `server_certificate_validation` hook, when set, decides alone
/// 2. `allow_invalid_certificates` accepts any certificate
/// 3. `allow_invalid_hostnames` forgives only a name mismatch
/// 4. otherwise the WebPKI result stands
///
/// Handshake signatures are checked in every case, so the peer must still
/// hold the private key of whatever certificate it presents.
#[derive(Clone)]
pub struct SettingsVerifier {
    inner: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
    validator: Option<ServerCertificateValidator>,
    allow_invalid_certificates: bool,
    allow_invalid_hostnames: bool,
}

impl fmt::Debug for SettingsVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsVerifier")
            .field("inner", &"WebPkiServerVerifier")
            .field("validator", &self.validator.as_ref().map(|_| "<hook>"))
            .field("allow_invalid_certificates", &self.allow_invalid_certificates)
            .field("allow_invalid_hostnames", &self.allow_invalid_hostnames)
            .finish()
    }
}

impl SettingsVerifier {
    /// Create a verifier trusting `roots`
    ///
    /// # Errors
    ///
    /// Returns an error if the `WebPKI` verifier cannot be built
    pub fn new(
        roots: RootCertStore,
        provider: Arc<CryptoProvider>,
        settings: &TlsSettings,
    ) -> Result<Self> {
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()
            .map_err(|e| anyhow!("failed to build WebPKI verifier: {e}"))?;

        Ok(Self {
            inner,
            provider,
            validator: settings.server_certificate_validation.clone(),
            allow_invalid_certificates: settings.allow_invalid_certificates,
            allow_invalid_hostnames: settings.allow_invalid_hostnames,
        })
    }

    fn settle(&self, peer: &PeerCertificate<'_>) -> Result<(), TlsError> {
        if let Some(validator) = &self.validator {
            if validator(peer) {
                if let Some(err) = peer.policy_error {
                    warn!(error = %err, "server certificate accepted by validation hook");
                }
                return Ok(());
            }
            return Err(peer.policy_error.cloned().unwrap_or_else(|| {
                TlsError::General("server certificate rejected by validation hook".to_string())
            }));
        }

        match peer.policy_error {
            None => Ok(()),
            Some(err) if self.allow_invalid_certificates => {
                warn!(error = %err, "accepting invalid server certificate");
                Ok(())
            }
            Some(err) if self.allow_invalid_hostnames && is_name_mismatch(err) => {
                warn!(error = %err, "accepting server certificate for another host");
                Ok(())
            }
            Some(err) => Err(err.clone()),
        }
    }
}

fn is_name_mismatch(err: &TlsError) -> bool {
    matches!(
        err,
        TlsError::InvalidCertificate(
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
        )
    )
}

impl ServerCertVerifier for SettingsVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let policy_error = self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            .err();

        debug!(
            server = ?server_name,
            valid = policy_error.is_none(),
            "verifying server certificate"
        );

        let peer = PeerCertificate {
            host: server_name,
            end_entity,
            intermediates,
            policy_error: policy_error.as_ref(),
        };

        self.settle(&peer).map(|()| ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
