//! `reqwest`-backed fetcher.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{Fetcher, NetworkError};
use crate::models::{Request, StoredResponse};

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// No request timeout and no retries: a slow or failing origin is the
    /// caller's to see, exactly as the network reports it.
    pub fn new() -> Result<Self, NetworkError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<StoredResponse, NetworkError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %url, status, bytes = body.len(), "Fetched from network");

        Ok(StoredResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    /// Serve one connection with `raw` after waiting `delay`.
    async fn serve_once(delay: Duration, raw: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf[read..]).await.expect("read");
                if n == 0 {
                    return;
                }
                read += n;
            }
            tokio::time::sleep(delay).await;
            socket.write_all(raw).await.expect("write");
            socket.shutdown().await.ok();
        });
        Url::parse(&format!("http://{}/big.jpg", addr)).expect("url")
    }

    #[test]
    fn test_new_builds_client() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let fetcher = HttpFetcher::new().expect("client");
        // Port 1 is reserved and nothing listens on it
        let url = Url::parse("http://127.0.0.1:1/").expect("url");
        let result = fetcher.fetch(&Request::get(url)).await;
        assert!(matches!(result, Err(NetworkError::Request(_))));
    }

    #[tokio::test]
    async fn test_slow_origin_is_waited_for() {
        // Past the 30 s mark common client timeouts sit at
        let url = serve_once(
            Duration::from_secs(32),
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;

        let response = HttpFetcher::new()
            .expect("client")
            .fetch(&Request::get(url))
            .await
            .expect("slow response");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"ok");
    }

    #[tokio::test]
    async fn test_non_ascii_header_values_are_kept() {
        let url = serve_once(
            Duration::ZERO,
            b"HTTP/1.1 404 Not Found\r\nX-Name: caf\xc3\xa9\r\nX-Raw: \xff\r\nContent-Length: 2\r\nConnection: close\r\n\r\nno",
        )
        .await;

        let response = HttpFetcher::new()
            .expect("client")
            .fetch(&Request::get(url))
            .await
            .expect("response");
        assert_eq!(response.status, 404);
        assert_eq!(response.header("x-name"), Some("caf\u{e9}".as_bytes()));
        assert_eq!(response.header_str("x-name"), Some("caf\u{e9}"));
        assert_eq!(response.header("x-raw"), Some(&[0xffu8][..]));
        assert_eq!(response.header_str("x-raw"), None);
        assert_eq!(response.body, b"no");
    }
}
