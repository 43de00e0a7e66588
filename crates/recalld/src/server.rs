//! JSON-lines request loop.
//!
//! Each line a client sends is one [`Request`]; each line written back is
//! one [`Response`]. A connection closes on EOF, on an I/O error, after
//! `idle` elapses without a complete line, or after a line longer than
//! [`MAX_REQUEST_BYTES`].

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use recall_core::{dispatch, MemoryManager, Request, Response};

/// Longest request line accepted, newline included.
pub const MAX_REQUEST_BYTES: usize = 1 << 20;

/// Accept connections until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    manager: Arc<MemoryManager>,
    idle: Duration,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(event = "server.shutdown");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(event = "server.accept_failed", error = %e);
                        continue;
                    }
                };
                debug!(event = "connection.opened", peer = %peer);
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, manager, idle).await {
                        warn!(event = "connection.failed", peer = %peer, error = %e);
                    }
                    debug!(event = "connection.closed", peer = %peer);
                });
            }
        }
    }
}

/// Serve one client until EOF, idle timeout, or an oversized request.
pub async fn serve_connection<S>(
    stream: S,
    manager: Arc<MemoryManager>,
    idle: Duration,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    serve_lines(stream, manager, idle, MAX_REQUEST_BYTES).await
}

async fn serve_lines<S>(
    stream: S,
    manager: Arc<MemoryManager>,
    idle: Duration,
    max_line: usize,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        // One byte past the cap tells an oversized line from one that fits exactly.
        let limit = max_line as u64 + 1;
        let mut limited = (&mut reader).take(limit);
        let read = limited.read_until(b'\n', &mut buf);
        let n = match timeout(idle, read).await {
            Err(_) => {
                debug!(
                    event = "connection.idle_timeout",
                    idle_secs = idle.as_secs_f64()
                );
                return Ok(());
            }
            Ok(result) => result?,
        };
        if n == 0 {
            return Ok(());
        }

        if buf.len() > max_line {
            warn!(event = "connection.request_too_large", max_bytes = max_line);
            let response = Response::failure(format!("request exceeds {max_line} bytes"));
            write_response(&mut writer, &response).await?;
            return Ok(());
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(&manager, line.trim_end()).await,
            Err(e) => Response::failure(format!("invalid request: {e}")),
        };
        write_response(&mut writer, &response).await?;
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

async fn handle_line(manager: &Arc<MemoryManager>, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::failure(format!("invalid request: {e}")),
    };

    // State changes hit the filesystem; keep them off the reactor.
    let manager = Arc::clone(manager);
    match tokio::task::spawn_blocking(move || dispatch(&manager, request)).await {
        Ok(response) => response,
        Err(e) => {
            warn!(event = "rpc.panicked", error = %e);
            Response::failure("internal error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::RecallConfig;
    use serde_json::{json, Value};
    use tokio::io::{duplex, Lines};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    const IDLE: Duration = Duration::from_secs(5);

    fn manager() -> Arc<MemoryManager> {
        Arc::new(MemoryManager::in_memory(RecallConfig::default()))
    }

    async fn reply<R: AsyncRead + Unpin>(reader: &mut Lines<BufReader<R>>) -> Response {
        let line = reader.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn roundtrip<R, W>(
        reader: &mut Lines<BufReader<R>>,
        writer: &mut W,
        request: Value,
    ) -> Response
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = serde_json::to_vec(&request).unwrap();
        line.push(b'\n');
        writer.write_all(&line).await.unwrap();
        reply(reader).await
    }

    #[tokio::test]
    async fn test_requests_answered_in_order() {
        let (client, server) = duplex(4096);
        let m = manager();
        let handle = tokio::spawn(serve_connection(server, Arc::clone(&m), IDLE));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        let params = json!({"content": "Runs arch linux", "type": "fact"});
        let request = json!({"method": "add_memory", "params": params});
        let added = roundtrip(&mut lines, &mut write_half, request).await;
        assert!(added.ok);

        let stats = roundtrip(&mut lines, &mut write_half, json!({"method": "stats"})).await;
        assert_eq!(stats.result.unwrap()["total_memories"], 1);

        drop(write_half);
        drop(lines);
        handle.await.unwrap().unwrap();
        assert_eq!(m.stats().total_memories, 1);
    }

    #[tokio::test]
    async fn test_malformed_line_gets_error_response() {
        let (client, server) = duplex(4096);
        let handle = tokio::spawn(serve_connection(server, manager(), IDLE));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"this is not json\n\n").await.unwrap();
        let rejected = reply(&mut lines).await;
        assert!(!rejected.ok);
        assert!(rejected.error.unwrap().starts_with("invalid request"));

        write_half.write_all(b"\xff\xfe\n").await.unwrap();
        assert!(!reply(&mut lines).await.ok);

        // The connection stays usable.
        let request = json!({"method": "get_context_for_prompt"});
        let ok = roundtrip(&mut lines, &mut write_half, request).await;
        assert_eq!(ok.result, Some(Value::String(String::new())));

        drop(write_half);
        drop(lines);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_is_refused_and_closed() {
        let (client, server) = duplex(4096);
        let m = manager();
        let handle = tokio::spawn(serve_lines(server, Arc::clone(&m), IDLE, 64));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        let content = "x".repeat(200);
        let params = json!({"content": content, "type": "fact"});
        let body = json!({"method": "add_memory", "params": params});
        let mut request = serde_json::to_vec(&body).unwrap();
        request.push(b'\n');
        write_half.write_all(&request).await.unwrap();

        let refused = reply(&mut lines).await;
        assert!(!refused.ok);
        assert_eq!(refused.error.as_deref(), Some("request exceeds 64 bytes"));

        handle.await.unwrap().unwrap();
        assert!(lines.next_line().await.unwrap().is_none());
        assert_eq!(m.stats().total_memories, 0);
    }

    #[tokio::test]
    async fn test_line_at_the_cap_is_served() {
        let (client, server) = duplex(4096);
        let request = b"{\"method\": \"stats\"}\n";
        let handle = tokio::spawn(serve_lines(server, manager(), IDLE, request.len()));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(request).await.unwrap();
        assert!(reply(&mut lines).await.ok);

        // A final request without a trailing newline is still answered.
        let unterminated = &request[..request.len() - 1];
        write_half.write_all(unterminated).await.unwrap();
        write_half.shutdown().await.unwrap();
        assert!(reply(&mut lines).await.ok);

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_idle_connection_closes() {
        let (_client, server) = duplex(64);
        let serving = serve_connection(server, manager(), Duration::from_millis(50));
        let result = timeout(IDLE, serving).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_serve_over_tcp_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, manager(), IDLE, async move {
            let _ = stop_rx.await;
        }));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let request = json!({"method": "start_conversation", "params": {"topic": "Networking"}});
        let started = roundtrip(&mut lines, &mut write_half, request).await;
        assert_eq!(started.result.unwrap()["topic"], "Networking");

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
