//! Loopback listener receiving the browser redirect.
//!
//! The listener is bound before the browser is opened so the redirect can
//! never race the bind. It answers exactly one request on the callback path;
//! anything else the browser asks for (a favicon, say) gets a 404 and the
//! wait continues. The browser's connection is held open until the caller
//! knows whether the login worked, so the page shown reflects the real outcome.

use consolectl_types::{ConsoleError, Result};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};

/// Path component of the redirect URI.
pub const CALLBACK_PATH: &str = "/callback";

const MAX_REQUEST_BYTES: usize = 8192;

/// How long a connection may take to send its request head.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<html><body><h1>Login successful</h1>\
    <p>You may close this tab and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Login failed</h1>\
    <p>Return to the terminal for details.</p></body></html>";
const NOT_FOUND: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// A bound `127.0.0.1` listener waiting for the redirect.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
    read_timeout: Duration,
}

impl CallbackListener {
    /// Bind `127.0.0.1:<port>`. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::InteractiveLogin`] if the port cannot be bound.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AddrInUse {
                    ConsoleError::InteractiveLogin(format!(
                        "callback port {port} is already in use; \
                         another login may be running (check with `lsof -i :{port}`)"
                    ))
                } else {
                    ConsoleError::InteractiveLogin(format!(
                        "cannot bind callback port {port}: {e}"
                    ))
                }
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| ConsoleError::InteractiveLogin(e.to_string()))?;
        Ok(Self {
            listener,
            addr,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Limit on how long one connection may stay silent before it is dropped.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// `redirect_uri` to register with the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{CALLBACK_PATH}", self.addr.port())
    }

    /// Wait for the redirect. Only the per-connection read is bounded; the
    /// overall wait is the caller's.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::InteractiveLogin`] if accepting fails.
    pub async fn accept(&self) -> Result<Callback> {
        loop {
            let (mut stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| ConsoleError::InteractiveLogin(format!("accept failed: {e}")))?;

            let request =
                match tokio::time::timeout(self.read_timeout, read_request_head(&mut stream)).await
                {
                    Ok(Ok(r)) => r,
                    Ok(Err(e)) => {
                        tracing::debug!(%peer, error = %e, "dropping unreadable callback connection");
                        continue;
                    }
                    Err(_) => {
                        tracing::debug!(%peer, "dropping silent callback connection");
                        continue;
                    }
                };

            let target = request_target(&request);
            let (path, query) = target.split_once('?').unwrap_or((target, ""));
            if path != CALLBACK_PATH {
                tracing::debug!(%peer, path, "ignoring request outside the callback path");
                let _ = stream.write_all(NOT_FOUND).await;
                let _ = stream.shutdown().await;
                continue;
            }

            return match parse_query(query) {
                Ok(params) => Ok(Callback { params, stream }),
                Err(e) => {
                    let rejected = Callback {
                        params: HashMap::new(),
                        stream,
                    };
                    let _ = rejected.respond(false).await;
                    Err(e)
                }
            };
        }
    }
}

/// The redirect request, with the browser still waiting for an answer.
#[derive(Debug)]
pub struct Callback {
    params: HashMap<String, String>,
    stream: TcpStream,
}

impl Callback {
    /// Query parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Show the success or failure page and close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::InteractiveLogin`] if the page could not be
    /// written.
    pub async fn respond(mut self, success: bool) -> Result<()> {
        let (status, page) = if success {
            ("200 OK", SUCCESS_PAGE)
        } else {
            ("400 Bad Request", FAILURE_PAGE)
        };
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{page}",
            page.len()
        );
        self.stream
            .write_all(response.as_bytes())
            .await
            .map_err(|e| {
                ConsoleError::InteractiveLogin(format!("failed to answer the browser: {e}"))
            })?;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Second token of the request line, e.g. `/callback?code=..` in
/// `GET /callback?code=.. HTTP/1.1`.
fn request_target(request: &str) -> &str {
    request
        .lines()
        .next()
        .and_then(|line| line.split_ascii_whitespace().nth(1))
        .unwrap_or("/")
}

fn parse_query(query: &str) -> Result<HashMap<String, String>> {
    serde_urlencoded::from_str(query)
        .map_err(|e| ConsoleError::InteractiveLogin(format!("invalid callback query: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_target() {
        let req = "GET /callback?code=abc&state=xyz HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert_eq!(request_target(req), "/callback?code=abc&state=xyz");
        assert_eq!(request_target(""), "/");
    }

    #[test]
    fn test_parse_query_decodes() {
        let params = parse_query("code=a%2Bb&state=st").unwrap();
        assert_eq!(params.get("code").map(String::as_str), Some("a+b"));
        assert_eq!(params.get("state").map(String::as_str), Some("st"));
        assert!(parse_query("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_uri_uses_bound_port() {
        let listener = CallbackListener::bind(0).await.unwrap();
        let port = listener.local_addr().port();
        assert_ne!(port, 0);
        assert_eq!(
            listener.redirect_uri(),
            format!("http://127.0.0.1:{port}/callback")
        );
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let first = CallbackListener::bind(0).await.unwrap();
        let err = CallbackListener::bind(first.local_addr().port())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InteractiveLogin(_)));
    }

    async fn raw_get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_accept_skips_other_paths_and_responds() {
        let listener = CallbackListener::bind(0).await.unwrap();
        let addr = listener.local_addr();

        let client = tokio::spawn(async move {
            let favicon = raw_get(addr, "/favicon.ico").await;
            let page = raw_get(addr, "/callback?code=c1&state=s1").await;
            (favicon, page)
        });

        let callback = listener.accept().await.unwrap();
        assert_eq!(callback.param("code"), Some("c1"));
        assert_eq!(callback.param("state"), Some("s1"));
        callback.respond(true).await.unwrap();

        let (favicon, page) = client.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains("Login successful"));
    }

    #[tokio::test]
    async fn test_silent_connection_does_not_block_the_callback() {
        let listener = CallbackListener::bind(0)
            .await
            .unwrap()
            .with_read_timeout(Duration::from_millis(100));
        let addr = listener.local_addr();

        // Connects first and never sends a byte.
        let _silent = TcpStream::connect(addr).await.unwrap();
        let client = tokio::spawn(async move { raw_get(addr, "/callback?code=c2&state=s2").await });

        let callback = tokio::time::timeout(Duration::from_secs(3), listener.accept())
            .await
            .expect("accept stalled on the silent connection")
            .unwrap();
        assert_eq!(callback.param("code"), Some("c2"));
        callback.respond(true).await.unwrap();
        assert!(client.await.unwrap().starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn test_failure_page() {
        let listener = CallbackListener::bind(0).await.unwrap();
        let addr = listener.local_addr();
        let client = tokio::spawn(async move { raw_get(addr, "/callback?error=access_denied").await });

        let callback = listener.accept().await.unwrap();
        assert_eq!(callback.param("error"), Some("access_denied"));
        callback.respond(false).await.unwrap();

        let page = client.await.unwrap();
        assert!(page.starts_with("HTTP/1.1 400"));
        assert!(page.contains("Login failed"));
    }
}
