//! End-to-end tests for the Veracode client.
//!
//! Each test starts a [`FakeVeracode`] server on a loopback port. The server
//! verifies every request's `VERACODE-HMAC-SHA-256` signature the way the
//! real service does, records what it received, and answers with canned XML
//! bodies keyed by endpoint name.
//!
//! ```text
//! cargo test -p veracode-integration
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE, HOST};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use veracode_auth::{Credentials, StaticCredentialProvider, verify_authorization_header};
use veracode_client::{ClientConfig, VeracodeClient};

/// API key id the fake server accepts.
pub const TEST_KEY_ID: &str = "integration-id";
/// Hex secret matching [`TEST_KEY_ID`].
pub const TEST_KEY_SECRET: &str = "3ddaeeb10ca690df3fee5e3bd1c329fa";

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// One request as the fake server received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request method.
    pub method: Method,
    /// Path and query as sent on the request line.
    pub path_and_query: String,
    /// `Ok(())` when the signature verified, otherwise the rejection reason.
    pub verified: Result<(), String>,
    /// `Accept-Encoding` header, if sent.
    pub accept_encoding: Option<String>,
    /// `Content-Type` header, if sent.
    pub content_type: Option<String>,
    /// Raw request body.
    pub body: Bytes,
}

impl CapturedRequest {
    /// The body as lossy UTF-8, for asserting on multipart text.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Whether the body contains `needle` as a byte sequence.
    #[must_use]
    pub fn body_contains(&self, needle: &[u8]) -> bool {
        self.body.windows(needle.len()).any(|w| w == needle)
    }

    /// The value of multipart text field `name`, if present.
    #[must_use]
    pub fn form_text(&self, name: &str) -> Option<String> {
        let text = self.body_text();
        let marker = format!("name=\"{name}\"\r\n\r\n");
        let start = text.find(&marker)? + marker.len();
        let end = text[start..].find("\r\n")?;
        Some(text[start..start + end].to_owned())
    }
}

#[derive(Debug)]
struct ServerState {
    credentials: StaticCredentialProvider,
    replies: Mutex<HashMap<String, (StatusCode, String)>>,
    requests: Mutex<Vec<CapturedRequest>>,
}

/// In-process stand-in for the Veracode XML API.
#[derive(Debug)]
pub struct FakeVeracode {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl FakeVeracode {
    /// Start a server accepting [`TEST_KEY_ID`] / [`TEST_KEY_SECRET`].
    ///
    /// # Errors
    ///
    /// Returns an error if the loopback listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        init_tracing();

        let credentials = Credentials::new(TEST_KEY_ID, TEST_KEY_SECRET)?;
        let state = Arc::new(ServerState {
            credentials: StaticCredentialProvider::new([credentials]),
            replies: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(serve(listener, Arc::clone(&state)));
        debug!(%addr, "fake Veracode API listening");

        Ok(Self { addr, state, task })
    }

    /// Answer `endpoint` (e.g. `uploadfile.do`) with `body` and status 200.
    pub fn reply(&self, endpoint: &str, body: &str) {
        self.reply_with_status(endpoint, StatusCode::OK, body);
    }

    /// Answer `endpoint` with an explicit status.
    pub fn reply_with_status(&self, endpoint: &str, status: StatusCode, body: &str) {
        self.state
            .replies
            .lock()
            .insert(endpoint.to_owned(), (status, body.to_owned()));
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().clone()
    }

    /// Base URL to point a client at.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("http://{}/api/5.0/", self.addr)
    }

    /// A client configured with the accepted credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn client(&self) -> anyhow::Result<VeracodeClient> {
        self.client_with_secret(TEST_KEY_SECRET)
    }

    /// A client signing with `secret` under [`TEST_KEY_ID`].
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn client_with_secret(&self, secret: &str) -> anyhow::Result<VeracodeClient> {
        let config = ClientConfig {
            api_base: self.api_base(),
            timeout_secs: 10,
            ..ClientConfig::new(TEST_KEY_ID, secret)
        };
        Ok(VeracodeClient::new(&config)?)
    }
}

impl Drop for FakeVeracode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let svc = service_fn(move |req| handle(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                debug!(peer_addr = %peer_addr, error = %e, "connection closed with error");
            }
        });
    }
}

async fn handle(
    state: Arc<ServerState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            Bytes::new()
        }
    };

    let header = |name: http::header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
    };
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_owned(), |pq| pq.as_str().to_owned());

    let verified = verify(&state, header(AUTHORIZATION), header(HOST), &path_and_query, &parts.method);
    let endpoint = parts.uri.path().rsplit('/').next().unwrap_or_default().to_owned();

    state.requests.lock().push(CapturedRequest {
        method: parts.method.clone(),
        path_and_query,
        verified: verified.clone(),
        accept_encoding: header(ACCEPT_ENCODING),
        content_type: header(CONTENT_TYPE),
        body,
    });

    let (status, reply) = match verified {
        Ok(()) => state
            .replies
            .lock()
            .get(&endpoint)
            .cloned()
            .unwrap_or_else(|| (StatusCode::NOT_FOUND, format!("no reply for {endpoint}"))),
        Err(reason) => (StatusCode::UNAUTHORIZED, reason),
    };

    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/xml")
        .body(Full::new(Bytes::from(reply)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
    Ok(response)
}

fn verify(
    state: &ServerState,
    authorization: Option<String>,
    host: Option<String>,
    path_and_query: &str,
    method: &Method,
) -> Result<(), String> {
    let authorization = authorization.ok_or("missing Authorization header")?;
    let host = host.ok_or("missing Host header")?;
    let uri: http::Uri = format!("http://{host}{path_and_query}")
        .parse()
        .map_err(|e| format!("bad request target: {e}"))?;
    verify_authorization_header(&authorization, &uri, method, &state.credentials)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

mod test_auth;
mod test_upload;
