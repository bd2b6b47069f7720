//! TLS transport: certificate loading and a TLS-terminating listener.

use crate::config::TlsConfig;
use axum::serve::Listener;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::{server::TlsStream, TlsAcceptor};

/// Upper bound on a single client's handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while loading TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse PEM in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Builds a TLS acceptor from the certificate chain and private key named in
/// `config`.
///
/// # Errors
///
/// Returns `TlsError` if either file is unreadable, contains no usable PEM
/// block, or rustls rejects the pair.
pub fn load_tls_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(&config.cert_path)?;
    tracing::info!(
        cert_path = %config.cert_path.display(),
        cert_count = certs.len(),
        "loaded TLS certificates"
    );

    let key = load_private_key(&config.key_path)?;
    tracing::info!(key_path = %config.key_path.display(), "loaded TLS private key");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    // PKCS#8, PKCS#1 (RSA) and SEC1 (EC) keys are all accepted.
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Handshaken connections waiting for the HTTP server to pick them up.
const READY_BACKLOG: usize = 64;

/// A TCP listener that completes a TLS handshake before handing each
/// connection to the HTTP server.
///
/// A background task accepts TCP connections and runs every handshake in its
/// own task, so a client that stalls mid-handshake never holds up the others.
/// Connections whose handshake fails or times out are logged and dropped.
/// Dropping the listener stops the accept task and releases the socket.
pub struct TlsListener {
    local_addr: SocketAddr,
    ready: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    accept_task: JoinHandle<()>,
}

impl TlsListener {
    /// Starts accepting on `inner`. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the error from reading the socket's local address.
    pub fn new(inner: TcpListener, acceptor: TlsAcceptor) -> std::io::Result<Self> {
        let local_addr = inner.local_addr()?;
        let (tx, ready) = mpsc::channel(READY_BACKLOG);
        let accept_task = tokio::spawn(accept_loop(inner, acceptor, tx));
        Ok(Self {
            local_addr,
            ready,
            accept_task,
        })
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    mut inner: TcpListener,
    acceptor: TlsAcceptor,
    ready: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    while !ready.is_closed() {
        let (stream, addr) = Listener::accept(&mut inner).await;
        let acceptor = acceptor.clone();
        let ready = ready.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => {
                    // The server is gone; the connection is dropped.
                    let _ = ready.send((tls_stream, addr)).await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(%addr, error = %e, "TLS handshake failed");
                }
                Err(_) => {
                    tracing::warn!(%addr, "TLS handshake timed out");
                }
            }
        });
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.ready.recv().await {
            Some(conn) => conn,
            // Only reachable once the accept task has stopped; there is
            // nothing left to hand out.
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}
