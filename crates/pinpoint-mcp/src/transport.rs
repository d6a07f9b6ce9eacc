//! Stdio transport for tool-server communication.
//!
//! Spawns a child process and manages async communication over stdin/stdout
//! using newline-delimited JSON messages. Responses are correlated to
//! requests by id; unsolicited `toolDetails` announcements are routed to a
//! separate channel.

use crate::error::McpError;
use crate::jsonrpc::{ANNOUNCEMENT_KIND, JsonRpcRequest, JsonRpcResponse, ToolAnnouncement};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Async stdio transport for communicating with a tool-server process.
#[derive(Debug)]
pub struct StdioTransport {
    next_id: AtomicU64,
    write_tx: mpsc::Sender<String>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>,
    announce_rx: Mutex<mpsc::Receiver<ToolAnnouncement>>,
    closed: Arc<AtomicBool>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
    child: Arc<Mutex<Child>>,
}

impl StdioTransport {
    /// Spawn a child process and start background reader/writer tasks.
    ///
    /// The child's stderr is inherited so tool-server logs stay visible.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: command.to_string(),
            source: e,
        })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        // Writer task: drains channel and writes to child stdin
        let (write_tx, mut write_rx) = mpsc::channel::<String>(64);
        let writer_handle = tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = write_rx.recv().await {
                if stdin.write_all(msg.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        // Reader task: reads lines from stdout and routes each one — id-bearing
        // responses to their pending request, announcements to the announce
        // channel. On EOF the pending map is drained so waiters fail fast.
        let (announce_tx, announce_rx) = mpsc::channel::<ToolAnnouncement>(8);
        let pending_for_reader = Arc::clone(&pending);
        let closed_for_reader = Arc::clone(&closed);
        let reader_handle = tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                let value: serde_json::Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("Unparseable line from tool server: {e}: {line}");
                        continue;
                    }
                };
                if value.get("type").and_then(|t| t.as_str()) == Some(ANNOUNCEMENT_KIND) {
                    match serde_json::from_value::<ToolAnnouncement>(value) {
                        Ok(ann) => {
                            let _ = announce_tx.send(ann).await;
                        }
                        Err(e) => {
                            tracing::warn!("Malformed tool announcement: {e}");
                        }
                    }
                    continue;
                }
                let resp: JsonRpcResponse = match serde_json::from_value(value) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Failed to parse tool-server response: {e}: {line}");
                        continue;
                    }
                };
                if let Some(id) = resp.id {
                    let mut pending = pending_for_reader.lock().await;
                    if let Some(tx) = pending.remove(&id) {
                        let _ = tx.send(resp);
                    } else {
                        tracing::warn!("Response with no outstanding request id {id}");
                    }
                }
            }
            closed_for_reader.store(true, Ordering::SeqCst);
            pending_for_reader.lock().await.clear();
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            write_tx,
            pending,
            announce_rx: Mutex::new(announce_rx),
            closed,
            reader_handle,
            writer_handle,
            child: Arc::new(Mutex::new(child)),
        })
    }

    /// Send a JSON-RPC request and wait for the response.
    ///
    /// There is no deadline here: only the initialization handshake is
    /// time-bounded, by the caller.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let serialized = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        // The reader sets `closed` before draining the map, so checking after
        // the insert means a request can never be parked forever.
        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().await.remove(&id);
            return Err(McpError::Protocol(
                "Tool server closed the connection".to_string(),
            ));
        }

        self.write_tx
            .send(serialized)
            .await
            .map_err(|_| McpError::Protocol("Writer channel closed".to_string()))?;

        rx.await
            .map_err(|_| McpError::Protocol("Tool server closed the connection".to_string()))
    }

    /// Receive the next unsolicited catalog announcement.
    ///
    /// Returns `None` when the transport has closed without announcing.
    pub async fn recv_announcement(&self) -> Option<ToolAnnouncement> {
        self.announce_rx.lock().await.recv().await
    }

    /// Shut down the transport: drop the write channel, wait briefly, then kill.
    pub async fn shutdown(self) {
        // Drop write channel to send EOF to child stdin
        drop(self.write_tx);

        let child = self.child;

        // Give the child 5 seconds to exit gracefully
        let graceful = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let mut child = child.lock().await;
            let _ = child.wait().await;
        })
        .await;

        if graceful.is_err() {
            let mut child = child.lock().await;
            let _ = child.kill().await;
        }

        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_echo_process() {
        // Use `cat` as a simple echo process
        let transport = StdioTransport::spawn("cat", &[], &HashMap::new());
        assert!(transport.is_ok());
        let transport = transport.unwrap();
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn spawn_nonexistent_command_fails() {
        let result =
            StdioTransport::spawn("this_command_does_not_exist_xyz123", &[], &HashMap::new());
        match result {
            Err(McpError::SpawnFailed { name, .. }) => {
                assert_eq!(name, "this_command_does_not_exist_xyz123");
            }
            Err(other) => panic!("Expected SpawnFailed, got: {other:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[tokio::test]
    async fn request_response_roundtrip_with_mock() {
        // Mock tool server: answers every line with the next sequential id.
        // Request ids are allocated from 1, so the counter stays in sync.
        let script = r#"i=1; while IFS= read -r line; do echo "{\"jsonrpc\":\"2.0\",\"id\":$i,\"result\":{\"ok\":true}}"; i=$((i+1)); done"#;
        let transport = StdioTransport::spawn(
            "bash",
            &["-c".to_string(), script.to_string()],
            &HashMap::new(),
        );

        if transport.is_err() {
            // Skip test if bash is not available
            return;
        }
        let transport = transport.unwrap();

        let resp = transport
            .send_request("test/method", Some(serde_json::json!({})))
            .await;
        assert!(resp.is_ok());
        assert_eq!(resp.unwrap().result.unwrap()["ok"], true);

        let second = transport.send_request("test/method", None).await;
        assert!(second.is_ok());

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn announcement_routed_to_channel() {
        let script = r#"echo '{"type":"toolDetails","tools":[{"name":"ip_location_lookup","description":"d","inputSchema":{"type":"object"}}]}'; sleep 5"#;
        let transport = StdioTransport::spawn(
            "bash",
            &["-c".to_string(), script.to_string()],
            &HashMap::new(),
        );
        if transport.is_err() {
            return;
        }
        let transport = transport.unwrap();

        let ann = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            transport.recv_announcement(),
        )
        .await
        .expect("announcement should arrive")
        .expect("channel open");
        assert_eq!(ann.kind, "toolDetails");
        assert_eq!(ann.tools[0].name, "ip_location_lookup");

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn request_fails_fast_when_server_exits() {
        // `true` exits immediately: stdout closes without any response.
        let transport = StdioTransport::spawn("true", &[], &HashMap::new()).unwrap();

        // Give the reader task a moment to observe EOF.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let result = transport.send_request("test/method", None).await;
        match result {
            Err(McpError::Protocol(msg)) => assert!(msg.contains("closed")),
            other => panic!("Expected Protocol error, got: {other:?}"),
        }

        transport.shutdown().await;
    }
}
