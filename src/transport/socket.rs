//! Unix socket transport.
//!
//! Local clients exchange length-prefixed JSON envelopes over a stream
//! socket. Each connection is served by its own task and may send any
//! number of requests; a SUBSCRIBE turns the connection into a
//! notification stream until the client hangs up.

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use super::frame::{read_frame, write_frame, MAX_FRAME_LEN};
use crate::dispatch::Dispatcher;
use crate::error::FrameError;
use crate::models::{Request, RequestType, Response};
use crate::notify::NotificationBus;

/// File mode applied to the socket path.
pub const SOCKET_MODE: u32 = 0o660;

/// Error sent in place of a response that does not fit in one frame.
pub const RESPONSE_TOO_LARGE: &str = "response too large";

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// == Socket Server ==
/// A bound socket ready to accept connections.
pub struct SocketServer {
    listener: UnixListener,
    path: PathBuf,
    dispatcher: Dispatcher,
    bus: Option<Arc<NotificationBus>>,
}

impl SocketServer {
    /// Binds `path`, replacing any stale socket file left by a previous run.
    ///
    /// # Arguments
    /// * `path` - Filesystem path of the socket
    /// * `dispatcher` - Request handler shared with the HTTP transport
    /// * `bus` - Notification bus; `None` makes SUBSCRIBE an error
    pub fn bind(
        path: impl AsRef<Path>,
        dispatcher: Dispatcher,
        bus: Option<Arc<NotificationBus>>,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let listener = UnixListener::bind(&path)?;
        fs::set_permissions(&path, Permissions::from_mode(SOCKET_MODE))?;
        info!(path = %path.display(), "socket listening");

        Ok(Self {
            listener,
            path,
            dispatcher,
            bus,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts connections until the task is dropped or aborted.
    pub async fn run(self) {
        let mut next_conn: u64 = 0;
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    next_conn += 1;
                    let conn = next_conn;
                    let dispatcher = self.dispatcher.clone();
                    let bus = self.bus.clone();
                    tokio::spawn(async move {
                        debug!(conn, "connection accepted");
                        handle_connection(stream, dispatcher, bus, conn).await;
                        debug!(conn, "connection closed");
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for SocketServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketServer")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// == Connection ==
async fn handle_connection(
    stream: UnixStream,
    dispatcher: Dispatcher,
    bus: Option<Arc<NotificationBus>>,
    conn: u64,
) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let payload = match read_frame(&mut reader).await {
            Ok(payload) => payload,
            Err(e) if e.is_disconnect() => return,
            Err(e) => {
                warn!(conn, error = %e, "dropping connection after read failure");
                return;
            }
        };

        let request: Request = match serde_json::from_slice(&payload) {
            Ok(request) => request,
            Err(e) => {
                debug!(conn, error = %e, "undecodable request");
                let response = Response::error(format!("invalid request: {e}"));
                if reply(&mut writer, &response, conn).await.is_err() {
                    return;
                }
                continue;
            }
        };

        if request.kind == RequestType::Subscribe {
            match &bus {
                Some(bus) => {
                    if reply(&mut writer, &Response::ok(), conn).await.is_ok() {
                        subscribe(reader, writer, bus).await;
                    }
                    return;
                }
                None => {
                    let response = Response::error("notifications are disabled");
                    if reply(&mut writer, &response, conn).await.is_err() {
                        return;
                    }
                    continue;
                }
            }
        }

        let response = dispatcher.serve(request).await;
        if reply(&mut writer, &response, conn).await.is_err() {
            return;
        }
    }
}

/// Writes `response` as one frame. A response too large to frame is
/// replaced by an ERR so the client still gets exactly one reply.
async fn reply<W>(writer: &mut W, response: &Response, conn: u64) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = to_payload(response)?;
    if payload.len() > MAX_FRAME_LEN {
        warn!(conn, len = payload.len(), "response exceeds frame limit");
        payload = to_payload(&Response::error(RESPONSE_TOO_LARGE))?;
    }
    let result = write_frame(writer, &payload).await;
    if let Err(e) = &result {
        debug!(conn, error = %e, "response write failed");
    }
    result
}

fn to_payload(response: &Response) -> Result<Vec<u8>, FrameError> {
    serde_json::to_vec(response)
        .map_err(|e| FrameError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Hands the write half to the bus and waits for the client to hang up.
async fn subscribe(mut reader: OwnedReadHalf, writer: OwnedWriteHalf, bus: &NotificationBus) {
    let id = bus.register(writer).await;
    // Anything the subscriber sends after SUBSCRIBE is ignored.
    if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
        debug!(client = id, error = %e, "subscriber read failed");
    }
    bus.deregister(id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Mode, Ttl};
    use crate::test_support::store;

    async fn exchange(stream: &mut UnixStream, json: &str) -> serde_json::Value {
        write_frame(stream, json.as_bytes()).await.unwrap();
        let frame = read_frame(stream).await.unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    fn start(bus: Option<Arc<NotificationBus>>) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.sock");
        let (store, _) = store(Mode::Authority, Ttl::INFINITE);
        let server = SocketServer::bind(&path, Dispatcher::new(store), bus).unwrap();
        tokio::spawn(server.run());
        (dir, path)
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_file_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        fs::write(&path, b"left over").unwrap();

        let (store, _) = store(Mode::Authority, Ttl::INFINITE);
        let server = SocketServer::bind(&path, Dispatcher::new(store), None).unwrap();

        let mode = fs::metadata(server.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SOCKET_MODE);
    }

    #[tokio::test]
    async fn test_multiple_requests_per_connection() {
        let (_dir, path) = start(None);
        let mut stream = UnixStream::connect(&path).await.unwrap();

        let ok = exchange(&mut stream, r#"{"type":"UPDATE","items":{"a":[1,2]}}"#).await;
        assert_eq!(ok, serde_json::json!({"type": "OK"}));

        let got = exchange(&mut stream, r#"{"type":"GET","keys":["a"]}"#).await;
        assert_eq!(got, serde_json::json!({"type": "OK", "data": {"a": [1, 2]}}));
    }

    #[tokio::test]
    async fn test_bad_json_keeps_connection_open() {
        let (_dir, path) = start(None);
        let mut stream = UnixStream::connect(&path).await.unwrap();

        let err = exchange(&mut stream, "{not json").await;
        assert_eq!(err["type"], "ERR");

        let listed = exchange(&mut stream, r#"{"type":"LIST"}"#).await;
        assert_eq!(listed["type"], "OK");
    }

    #[tokio::test]
    async fn test_subscribe_when_disabled() {
        let (_dir, path) = start(None);
        let mut stream = UnixStream::connect(&path).await.unwrap();

        let response = exchange(&mut stream, r#"{"type":"SUBSCRIBE"}"#).await;
        assert_eq!(response["type"], "ERR");
        assert_eq!(response["error"], "notifications are disabled");
    }

    #[tokio::test]
    async fn test_subscriber_deregistered_on_hangup() {
        let bus = Arc::new(NotificationBus::new());
        let (_dir, path) = start(Some(bus.clone()));

        let mut stream = UnixStream::connect(&path).await.unwrap();
        let ack = exchange(&mut stream, r#"{"type":"SUBSCRIBE"}"#).await;
        assert_eq!(ack, serde_json::json!({"type": "OK"}));
        assert!(wait_for_subscribers(&bus, 1).await);

        drop(stream);
        assert!(wait_for_subscribers(&bus, 0).await);
    }

    #[tokio::test]
    async fn test_oversized_response_replaced_by_err() {
        let big = format!(r#""{}""#, "x".repeat(MAX_FRAME_LEN));
        let mut data = crate::models::DataMap::new();
        data.insert("k".to_string(), Some(crate::test_support::raw(&big)));

        let (mut client, mut server) = tokio::io::duplex(1024);
        let writer = tokio::spawn(async move {
            reply(&mut server, &Response::with_data(data), 1).await.unwrap();
        });

        let frame = read_frame(&mut client).await.unwrap();
        writer.await.unwrap();
        let response: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(
            response,
            serde_json::json!({"type": "ERR", "error": RESPONSE_TOO_LARGE})
        );
    }

    async fn wait_for_subscribers(bus: &NotificationBus, expected: usize) -> bool {
        for _ in 0..100 {
            if bus.len().await == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
