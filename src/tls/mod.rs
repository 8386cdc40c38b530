//! TLS configuration and handshake module
//!
//! Turns [`TlsSettings`] into a rustls client configuration and runs the
//! handshake for MongoDB connections.
//!
//! # Module Organization
//!
//! - `config` - TLS settings and minimum protocol version
//! - `callbacks` - Client certificate selection and server certificate validation hooks
//! - `identity` - PEM loading for client identities and CA bundles
//! - `verifier` - Server certificate verifier applying the settings
//! - `connector` - rustls `ClientConfig` construction and handshake
//! - `metadata` - Negotiated version, cipher and peer certificate details
//!
//! # Example
//!
//! ```rust,ignore
//! use mongotls::tls::{TlsSettings, TlsVersion, accept_any, always_select, ClientIdentity};
//!
//! let identity = ClientIdentity::from_pem_file("mongodb.pem".as_ref()).await?;
//! let tls = TlsSettings {
//!     min_protocol_version: Some(TlsVersion::Tls12),
//!     client_certificate_selection: Some(always_select(identity.certified_key()?)),
//!     server_certificate_validation: Some(accept_any()),
//!     ..Default::default()
//! };
//! ```

pub mod callbacks;
pub mod config;
pub mod connector;
pub mod identity;
pub mod metadata;
pub mod verifier;

// Re-export commonly used types
pub use callbacks::{
    CertificateRequest, ClientCertificateSelector, PeerCertificate, SelectorResolver,
    ServerCertificateValidator, accept_any, always_select, select_with, validate_with,
};
pub use config::{TlsSettings, TlsVersion};
pub use connector::{build_client_config, ensure_crypto_provider, handshake, server_name_from_host};
pub use identity::{ClientIdentity, load_cert_chain, load_root_store};
pub use metadata::TlsMetadata;
pub use verifier::SettingsVerifier;
