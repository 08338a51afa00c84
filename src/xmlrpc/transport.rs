// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(#[source] io::Error),
    #[error("host not found: {0}")]
    HostNotFound(String),
    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

impl TransportError {
    /// The endpoint could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(*self, TransportError::ConnectionRefused(_) | TransportError::HostNotFound(_))
    }

    fn other<E: Into<Box<dyn StdError + Send + Sync>>>(err: E) -> TransportError {
        TransportError::Other(err.into())
    }
}

/// Carries one request body to `url` and returns the response body.
pub trait Transport {
    fn send(&self, url: &str, body: &[u8], headers: &[(String, String)]) -> Result<Vec<u8>, TransportError>;
}

/// Plain `http://` POST over HTTP/1.1, one connection per call.
///
/// Each call drives its own single-threaded tokio runtime, so `send` blocks
/// and must not be called from inside another tokio runtime; there it fails
/// with `TransportError::Other` instead. Use `spawn_blocking` or a custom
/// `Transport` from async code.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> HttpTransport {
        HttpTransport
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str, body: &[u8], headers: &[(String, String)]) -> Result<Vec<u8>, TransportError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(TransportError::other(
                "blocking HTTP transport called from within a tokio runtime",
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(TransportError::other)?;
        runtime.block_on(post(url, body.to_vec(), headers))
    }
}

struct Target {
    host: String,
    port: u16,
    authority: String,
    path: String,
}

fn parse_target(url: &str) -> Result<Target, TransportError> {
    let uri: hyper::Uri = url.parse().map_err(TransportError::other)?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(scheme) => return Err(TransportError::other(format!("unsupported scheme {:?}", scheme))),
        None => return Err(TransportError::other(format!("no scheme in {:?}", url))),
    }
    let authority = match uri.authority() {
        Some(authority) => authority.as_str().to_string(),
        None => return Err(TransportError::other(format!("no host in {:?}", url))),
    };
    let host = uri.host().unwrap_or_default().trim_matches(|c| c == '[' || c == ']').to_string();
    let path = uri.path_and_query().map_or("/", |p| p.as_str()).to_string();
    Ok(Target {
        host,
        port: uri.port_u16().unwrap_or(80),
        authority,
        path,
    })
}

async fn connect(target: &Target) -> Result<TcpStream, TransportError> {
    let addrs: Vec<SocketAddr> = match tokio::net::lookup_host((target.host.as_str(), target.port)).await {
        Ok(addrs) => addrs.collect(),
        Err(_) => return Err(TransportError::HostNotFound(target.host.clone())),
    };
    if addrs.is_empty() {
        return Err(TransportError::HostNotFound(target.host.clone()));
    }
    match TcpStream::connect(&addrs[..]).await {
        Ok(stream) => Ok(stream),
        Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => Err(TransportError::ConnectionRefused(err)),
        Err(err) => Err(TransportError::other(err)),
    }
}

async fn post(url: &str, body: Vec<u8>, headers: &[(String, String)]) -> Result<Vec<u8>, TransportError> {
    let target = parse_target(url)?;
    let stream = connect(&target).await?;

    let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(TransportError::other)?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!("HTTP connection closed with error: {}", err);
        }
    });

    let mut request = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(target.path.as_str())
        .header(hyper::header::HOST, target.authority.as_str());
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let request = request
        .body(Full::new(Bytes::from(body)))
        .map_err(TransportError::other)?;

    let response = sender.send_request(request).await.map_err(TransportError::other)?;
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(TransportError::other)?
        .to_bytes();
    if !status.is_success() {
        return Err(TransportError::other(format!("HTTP status {}", status)));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_parse_target() {
        let target = parse_target("http://localhost:9001/RPC2?x=1").unwrap();
        assert_eq!(target.host, "localhost");
        assert_eq!(target.port, 9001);
        assert_eq!(target.authority, "localhost:9001");
        assert_eq!(target.path, "/RPC2?x=1");

        let target = parse_target("http://example.org").unwrap();
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
    }

    #[test]
    fn test_unsupported_urls() {
        for url in &["https://example.org/", "example.org/RPC2", "not a url"] {
            match parse_target(url) {
                Err(ref err) => assert!(!err.is_connectivity()),
                Ok(_) => panic!("{} accepted", url),
            }
        }
    }

    #[test]
    fn test_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/RPC2", port);
        match HttpTransport::new().send(&url, b"<methodCall/>", &[]) {
            Err(err) => assert!(err.is_connectivity(), "{:?}", err),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[test]
    fn test_refuses_to_nest_runtimes() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let result = runtime.block_on(async { HttpTransport::new().send("http://127.0.0.1:1/RPC2", b"", &[]) });
        match result {
            Err(TransportError::Other(err)) => assert!(err.to_string().contains("tokio runtime")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_post_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&request).contains("</methodCall>") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let body = "<methodResponse/>";
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            String::from_utf8(request).unwrap()
        });

        let url = format!("http://127.0.0.1:{}/RPC2", port);
        let headers = vec![("Content-Type".to_string(), "text/xml".to_string())];
        let response = HttpTransport::new().send(&url, b"<methodCall></methodCall>", &headers).unwrap();
        assert_eq!(response, b"<methodResponse/>");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /RPC2 HTTP/1.1\r\n"));
        assert!(request.to_lowercase().contains("content-type: text/xml"));
    }
}
