//! Connect to a MongoDB server over TLS and mutual TLS
//!
//! The `mongotls` binary runs three connection attempts (a TLS connection
//! string, client settings with a client certificate and custom certificate
//! hooks, and a plain connection string) and prints the database names each
//! one can list.

pub mod certs;
pub mod cli;
pub mod client;
pub mod demo;
pub mod tls;
pub mod uri;
pub mod wire;

pub use client::{Client, ClientSettings, ServerAddress};
pub use uri::ConnectionString;
