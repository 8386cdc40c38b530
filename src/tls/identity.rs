use super::ensure_crypto_provider;
use anyhow::{Context, Result, anyhow};
use rustls::{
    RootCertStore,
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer},
    sign::CertifiedKey,
};
use rustls_pemfile::{certs, private_key};
use std::{io::Cursor, path::Path, sync::Arc};
use tokio::fs;
use tracing::debug;

/// Certificate chain and private key presented for mutual TLS
///
/// MongoDB keeps both in one PEM file (`tlsCertificateKeyFile`), so
/// [`ClientIdentity::from_pem_file`] expects to find both in the same file.
#[derive(Debug)]
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Clone for ClientIdentity {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl ClientIdentity {
    /// Load a certificate chain and private key from a single PEM file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks either a
    /// certificate or a private key
    pub async fn from_pem_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .await
            .with_context(|| format!("failed to read client certificate {}", path.display()))?;

        let chain = parse_cert_chain(&data)
            .with_context(|| format!("no usable certificate in {}", path.display()))?;

        let key = private_key(&mut Cursor::new(&data))
            .map_err(|e| anyhow!("invalid private key PEM: {e}"))?
            .ok_or_else(|| anyhow!("no private key found in {}", path.display()))?;

        debug!(path = %path.display(), certificates = chain.len(), "loaded client identity");

        Ok(Self { chain, key })
    }

    #[must_use]
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Leaf certificate, the one the server authenticates
    #[must_use]
    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.chain.first()
    }

    /// Turn the identity into a signing-ready key for the handshake
    ///
    /// # Errors
    ///
    /// Returns an error if the key type is unsupported or the key does not
    /// match the leaf certificate
    pub fn certified_key(&self) -> Result<Arc<CertifiedKey>> {
        ensure_crypto_provider();
        let provider = CryptoProvider::get_default()
            .ok_or_else(|| anyhow!("no rustls crypto provider installed"))?;
        let key = CertifiedKey::from_der(self.chain.clone(), self.key.clone_key(), provider)
            .map_err(|e| anyhow!("client certificate and key are unusable: {e}"))?;
        Ok(Arc::new(key))
    }
}

/// Read every certificate from a PEM file
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no certificates
pub async fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = fs::read(path)
        .await
        .with_context(|| format!("failed to read certificate {}", path.display()))?;

    parse_cert_chain(&data).with_context(|| format!("no usable certificate in {}", path.display()))
}

/// Build a trust store from a CA bundle
///
/// # Errors
///
/// Returns an error if the bundle cannot be read or none of its
/// certificates is a usable trust anchor
pub async fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(load_cert_chain(path).await?);

    if added == 0 {
        anyhow::bail!("no valid CA certificates in {}", path.display());
    }
    if ignored > 0 {
        debug!(path = %path.display(), ignored, "skipped unparsable CA certificates");
    }

    Ok(store)
}

fn parse_cert_chain(data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let parsed = certs(&mut Cursor::new(data))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("invalid certificate PEM: {e}"))?;

    if parsed.is_empty() {
        anyhow::bail!("no certificates found");
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::tls::ensure_crypto_provider;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[tokio::test]
    async fn test_identity_from_combined_pem() {
        let identity = ClientIdentity::from_pem_file(&fixture("mongodb.pem"))
            .await
            .unwrap();
        assert_eq!(identity.chain().len(), 1);
        assert!(identity.leaf().is_some());
    }

    #[tokio::test]
    async fn test_identity_requires_private_key() {
        let result = ClientIdentity::from_pem_file(&fixture("client-cert-only.pem")).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("no private key found"), "{err:#}");
    }

    #[tokio::test]
    async fn test_identity_missing_file() {
        let result = ClientIdentity::from_pem_file(Path::new("/nonexistent/mongodb.pem")).await;
        let err = result.unwrap_err();
        assert!(
            err.to_string()
                .contains("failed to read client certificate /nonexistent/mongodb.pem"),
            "{err:#}"
        );
    }

    #[tokio::test]
    async fn test_identity_certified_key() {
        ensure_crypto_provider();
        let identity = ClientIdentity::from_pem_file(&fixture("mongodb.pem"))
            .await
            .unwrap();
        let key = identity.certified_key().unwrap();
        assert_eq!(key.cert.len(), 1);
        assert_eq!(
            key.end_entity_cert().unwrap().as_ref(),
            identity.leaf().unwrap().as_ref()
        );
    }

    #[tokio::test]
    async fn test_load_root_store() {
        let store = load_root_store(&fixture("rootCA.pem")).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_load_cert_chain_rejects_non_pem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pem");
        std::fs::write(&path, "this is not a certificate").unwrap();

        let err = load_cert_chain(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("no certificates found"), "{err:#}");
    }

    #[test]
    fn test_parse_cert_chain_empty() {
        assert!(parse_cert_chain(b"").is_err());
    }
}
