#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bson::{Document, doc};
use futures::{SinkExt, StreamExt};
use mongotls::{
    certs::CertificatePaths,
    client::ServerAddress,
    tls::ensure_crypto_provider,
    wire::{Message, OpMsgCodec},
};
use rustls::{
    RootCertStore, ServerConfig,
    crypto::ring::default_provider,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::WebPkiClientVerifier,
};
use std::{
    env,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    task::JoinHandle,
};
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Framed;

pub const DATABASES: [&str; 3] = ["admin", "config", "local"];

/// Record type and major version opening every `ClientHello`
const TLS_HANDSHAKE_RECORD: [u8; 2] = [0x16, 0x03];

pub fn skip_if_no_mongodb() -> bool {
    env::var("SKIP_MONGODB_TESTS").is_ok()
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn fixture_certs() -> CertificatePaths {
    CertificatePaths::resolve(&fixture(""), "rootCA.pem", "mongodb.pem")
}

/// How the mock server treats client certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    None,
    /// Verified against the test CA when presented, like mongod's
    /// `tlsAllowConnectionsWithoutCertificates`
    Optional,
    Required,
}

#[derive(Debug, Clone)]
pub struct MockOptions {
    /// `None` serves plain TCP
    pub tls: Option<ClientAuth>,
    /// Answer `hello`; when false only `isMaster` is known
    pub hello: bool,
    pub max_wire_version: i32,
    pub databases: Vec<String>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            tls: None,
            hello: true,
            max_wire_version: 21,
            databases: DATABASES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl MockOptions {
    pub fn tls(client_auth: ClientAuth) -> Self {
        Self {
            tls: Some(client_auth),
            ..Default::default()
        }
    }
}

/// What the server saw on one accepted connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub client_certificates: usize,
    pub commands: Vec<String>,
    /// `None` while open, then whether the client ended the stream cleanly
    /// (`close_notify` first on TLS)
    pub closed_cleanly: Option<bool>,
}

/// In-process server speaking just enough `OP_MSG` for `hello`,
/// `isMaster` and `listDatabases`
pub struct MockServer {
    pub address: ServerAddress,
    records: Arc<Mutex<Vec<ConnectionRecord>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = options.tls.map(|auth| TlsAcceptor::from(server_config(auth)));
        let records = Arc::new(Mutex::new(Vec::new()));
        let options = Arc::new(options);

        let handle = tokio::spawn({
            let records = Arc::clone(&records);
            async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let acceptor = acceptor.clone();
                    let records = Arc::clone(&records);
                    let options = Arc::clone(&options);

                    tokio::spawn(async move {
                        match acceptor {
                            Some(acceptor) => {
                                // failed handshakes just drop the connection
                                let Ok(stream) = acceptor.accept(stream).await else {
                                    return;
                                };
                                let client_certificates = stream
                                    .get_ref()
                                    .1
                                    .peer_certificates()
                                    .map_or(0, <[_]>::len);
                                serve(stream, client_certificates, &options, &records).await;
                            }
                            None => {
                                // like mongod without TLS, hang up on a ClientHello
                                let mut first = [0u8; 2];
                                if matches!(stream.peek(&mut first).await, Ok(2))
                                    && first == TLS_HANDSHAKE_RECORD
                                {
                                    return;
                                }
                                serve(stream, 0, &options, &records).await;
                            }
                        }
                    });
                }
            }
        });

        Self {
            address: ServerAddress::new("127.0.0.1", port),
            records,
            handle,
        }
    }

    pub fn records(&self) -> Vec<ConnectionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Wait until connection `index` is closed, `None` if it stays open
    pub async fn closed_cleanly(&self, index: usize) -> Option<bool> {
        for _ in 0..100 {
            let closed = self
                .records
                .lock()
                .unwrap()
                .get(index)
                .and_then(|record| record.closed_cleanly);
            if closed.is_some() {
                return closed;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve<S>(
    stream: S,
    client_certificates: usize,
    options: &MockOptions,
    records: &Mutex<Vec<ConnectionRecord>>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let index = {
        let mut records = records.lock().unwrap();
        records.push(ConnectionRecord {
            client_certificates,
            commands: Vec::new(),
            closed_cleanly: None,
        });
        records.len() - 1
    };

    let mut framed = Framed::new(stream, OpMsgCodec);

    let clean = loop {
        let request = match framed.next().await {
            Some(Ok(request)) => request,
            Some(Err(_)) => break false,
            None => break true,
        };

        let command = request.body.keys().next().cloned().unwrap_or_default();
        if let Some(record) = records.lock().unwrap().get_mut(index) {
            record.commands.push(command.clone());
        }

        let reply = Message::reply(request.request_id, respond(&command, options));
        if framed.send(reply).await.is_err() {
            break false;
        }
    };

    if let Some(record) = records.lock().unwrap().get_mut(index) {
        record.closed_cleanly = Some(clean);
    }
}

fn respond(command: &str, options: &MockOptions) -> Document {
    match command {
        "hello" if options.hello => doc! {
            "helloOk": true,
            "isWritablePrimary": true,
            "maxBsonObjectSize": 16_777_216,
            "maxWireVersion": options.max_wire_version,
            "minWireVersion": 0,
            "ok": 1.0,
        },
        "isMaster" | "ismaster" => doc! {
            "ismaster": true,
            "maxBsonObjectSize": 16_777_216,
            "maxWireVersion": options.max_wire_version,
            "minWireVersion": 0,
            "ok": 1.0,
        },
        "listDatabases" => doc! {
            "databases": options
                .databases
                .iter()
                .map(|name| doc! { "name": name.as_str(), "sizeOnDisk": 8192, "empty": false })
                .collect::<Vec<_>>(),
            "totalSize": 8192,
            "ok": 1.0,
        },
        other => doc! {
            "ok": 0.0,
            "errmsg": format!("no such command: '{other}'"),
            "code": 59,
            "codeName": "CommandNotFound",
        },
    }
}

fn read_pem(name: &str) -> (Vec<CertificateDer<'static>>, Option<PrivateKeyDer<'static>>) {
    let pem = std::fs::read(fixture(name)).unwrap();
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut pem.as_slice()).unwrap();
    (certs, key)
}

fn server_config(client_auth: ClientAuth) -> Arc<ServerConfig> {
    ensure_crypto_provider();
    let provider = Arc::new(default_provider());

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = if client_auth == ClientAuth::None {
        builder.with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.add_parsable_certificates(read_pem("rootCA.pem").0);

        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
        let verifier = if client_auth == ClientAuth::Optional {
            verifier.allow_unauthenticated()
        } else {
            verifier
        };
        builder.with_client_cert_verifier(verifier.build().unwrap())
    };

    let (chain, key) = read_pem("server.pem");
    Arc::new(builder.with_single_cert(chain, key.unwrap()).unwrap())
}
