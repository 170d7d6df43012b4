use crate::error::{ProtoError, Result};
use crate::frame::{read_frame, write_frame};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// One-shot request/response client: each call opens a fresh TCP connection,
/// sends a single frame, reads a single frame, and closes.
#[derive(Debug, Clone, Default)]
pub struct RpcClient;

impl RpcClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn request(&self, host: &str, port: u16, payload: &str) -> Result<String> {
        let addr = format!("{host}:{port}");
        let mut stream = TcpStream::connect(&addr).await?;
        write_frame(&mut stream, payload).await?;
        let response = read_frame(&mut stream).await?;
        debug!(%addr, request = payload, response = %response, "rpc round-trip");
        Ok(response)
    }

    /// `request` with a bound on the whole round-trip, connect included. Used
    /// for heartbeats and dispatched executions so a stalled worker cannot
    /// wedge the caller.
    pub async fn request_timeout(
        &self,
        host: &str,
        port: u16,
        payload: &str,
        timeout: Duration,
    ) -> Result<String> {
        match tokio::time::timeout(timeout, self.request(host, port, payload)).await {
            Ok(result) => result,
            Err(_) => Err(ProtoError::Timeout {
                addr: format!("{host}:{port}"),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn request_roundtrip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let req = read_frame(&mut stream).await.unwrap();
            assert_eq!(req, "PING");
            write_frame(&mut stream, "PONG|0").await.unwrap();
        });

        let client = RpcClient::new();
        let resp = client.request("127.0.0.1", port, "PING").await.unwrap();
        assert_eq!(resp, "PONG|0");
    }

    #[tokio::test]
    async fn timeout_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accept but never answer.
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = RpcClient::new();
        let err = client
            .request_timeout("127.0.0.1", port, "PING", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtoError::Timeout { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_io_error() {
        let client = RpcClient::new();
        // Bind-then-drop to get a port nothing listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = client.request("127.0.0.1", port, "PING").await.unwrap_err();
        assert!(matches!(err, ProtoError::Io(_)));
    }
}
