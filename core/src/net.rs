/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Sockets for the HTTP and mail clients: bounded TCP connects, the shared rustls
//! configuration, port probing for the mail session, and the plain-or-TLS client stream.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

/// TCP connect timeout for every client in this crate.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

fn client_config(alpn: Option<&[u8]>) -> Arc<ClientConfig> {
    let mut config = ClientConfig::builder()
        .with_root_certificates(build_root_store())
        .with_no_client_auth();
    if let Some(protocol) = alpn {
        config.alpn_protocols = vec![protocol.to_vec()];
    }
    Arc::new(config)
}

/// TLS client config for page fetches, offering ALPN `http/1.1`.
fn http_client_config() -> Arc<ClientConfig> {
    client_config(Some(b"http/1.1"))
}

static MAIL_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();
static HTTP_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

fn mail_connector() -> &'static TlsConnector {
    MAIL_CONNECTOR.get_or_init(|| TlsConnector::from(client_config(None)))
}

fn http_connector() -> &'static TlsConnector {
    HTTP_CONNECTOR.get_or_init(|| TlsConnector::from(http_client_config()))
}

pub(crate) fn server_name(host: &str) -> io::Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))
}

/// TCP connect bounded by `CONNECT_TIMEOUT`.
pub async fn tcp_connect(host: &str, port: u16) -> io::Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))?
}

/// Returns true when a TCP connection to `host:port` opens within `wait`.
pub async fn port_is_open(host: &str, port: u16, wait: Duration) -> bool {
    let addr = format!("{}:{}", host, port);
    match timeout(wait, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!(%addr, error = %e, "port check refused");
            false
        }
        Err(_) => {
            tracing::debug!(%addr, "port check timed out");
            false
        }
    }
}

async fn tls_handshake(
    connector: &TlsConnector,
    host: &str,
    tcp: TcpStream,
) -> io::Result<TlsStream<TcpStream>> {
    connector
        .connect(server_name(host)?, tcp)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))
}

/// Plain TCP or TLS client stream. Implicit TLS handshakes on connect (443, 465, 993, 995);
/// a plain mail stream can be upgraded once the server accepts STARTTLS.
pub enum ClientStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ClientStream {
    /// Connect for a mail protocol.
    pub async fn connect(host: &str, port: u16, implicit_tls: bool) -> io::Result<Self> {
        Self::open(mail_connector(), host, port, implicit_tls).await
    }

    /// Connect for HTTP; TLS offers ALPN `http/1.1`.
    pub async fn connect_http(host: &str, port: u16, tls: bool) -> io::Result<Self> {
        Self::open(http_connector(), host, port, tls).await
    }

    async fn open(connector: &TlsConnector, host: &str, port: u16, tls: bool) -> io::Result<Self> {
        let tcp = tcp_connect(host, port).await?;
        if tls {
            Ok(ClientStream::Tls(Box::new(tls_handshake(connector, host, tcp).await?)))
        } else {
            Ok(ClientStream::Plain(tcp))
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, ClientStream::Tls(_))
    }

    /// Handshake over the existing connection. Already-TLS streams come back unchanged.
    pub async fn upgrade_to_tls(self, host: &str) -> io::Result<Self> {
        match self {
            ClientStream::Plain(tcp) => Ok(ClientStream::Tls(Box::new(
                tls_handshake(mail_connector(), host, tcp).await?,
            ))),
            tls @ ClientStream::Tls(_) => Ok(tls),
        }
    }
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(port_is_open("127.0.0.1", port, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn closed_port_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(!port_is_open("127.0.0.1", port, Duration::from_secs(2)).await);
    }

    #[test]
    fn rejects_bad_server_name() {
        assert!(server_name("not a host").is_err());
        assert!(server_name("mail.example.com").is_ok());
    }
}
