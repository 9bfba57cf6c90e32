//! Line guard between the client stream and the MCP service
//!
//! The SDK's line codec ends the session on a line it cannot decode. Every
//! inbound line is screened here first: well-formed client messages are
//! forwarded to the service, anything else is answered with a JSON-RPC error
//! and the session keeps going.

use rmcp::model::{ClientJsonRpcMessage, ErrorCode};
use rmcp::ErrorData;
use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadHalf,
    WriteHalf,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SERVICE_BUFFER_BYTES: usize = 64 * 1024;

/// Requests the service answers; malformed calls to these are invalid params
const HANDLED_METHODS: &[&str] = &["initialize", "ping", "tools/list", "tools/call"];

/// Outcome of screening one inbound line
#[derive(Debug, PartialEq)]
enum Screened {
    Forward,
    Reject(String),
    Drop,
}

/// Background tasks relaying between the client stream and the service
pub(crate) struct LineGuard {
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl LineGuard {
    /// Start relaying; the returned stream is the service's side of the relay
    pub(crate) fn spawn<R, W>(reader: R, writer: W) -> (DuplexStream, Self)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (service_io, relay_io) = tokio::io::duplex(SERVICE_BUFFER_BYTES);
        let (relay_read, relay_write) = tokio::io::split(relay_io);
        let (reject_tx, reject_rx) = mpsc::unbounded_channel();

        let inbound = tokio::spawn(forward_input(reader, relay_write, reject_tx));
        let outbound = tokio::spawn(forward_output(relay_read, writer, reject_rx));

        (service_io, Self { inbound, outbound })
    }

    /// Wait for everything the service wrote to reach the client
    pub(crate) async fn finish(self) {
        self.inbound.abort();
        let _ = self.outbound.await;
    }

    pub(crate) fn abort(self) {
        self.inbound.abort();
        self.outbound.abort();
    }
}

async fn forward_input<R>(
    mut reader: R,
    mut service_in: WriteHalf<DuplexStream>,
    rejects: mpsc::UnboundedSender<String>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read client input: {}", e);
                break;
            }
        }

        let message = trim_line_ending(&line);
        if message.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match screen(message) {
            Screened::Forward => {
                if service_in.write_all(message).await.is_err()
                    || service_in.write_all(b"\n").await.is_err()
                {
                    break;
                }
            }
            Screened::Reject(response) => {
                if rejects.send(response).is_err() {
                    break;
                }
            }
            Screened::Drop => {}
        }
    }

    debug!("Client input closed");
    let _ = service_in.shutdown().await;
}

async fn forward_output<W>(
    service_out: ReadHalf<DuplexStream>,
    mut writer: W,
    mut rejects: mpsc::UnboundedReceiver<String>,
) where
    W: AsyncWrite + Unpin,
{
    let mut service_out = BufReader::new(service_out);
    let mut line = Vec::new();
    let mut rejects_open = true;

    loop {
        tokio::select! {
            // Partial reads stay in `line` until the newline arrives
            read = service_out.read_until(b'\n', &mut line) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Failed to read service output: {}", e);
                        break;
                    }
                }
                if !line.ends_with(b"\n") {
                    line.push(b'\n');
                }
                if write_line(&mut writer, &line).await.is_err() {
                    break;
                }
                line.clear();
            }
            reject = rejects.recv(), if rejects_open => match reject {
                Some(mut response) => {
                    response.push('\n');
                    if write_line(&mut writer, response.as_bytes()).await.is_err() {
                        break;
                    }
                }
                None => rejects_open = false,
            },
        }
    }

    let _ = writer.flush().await;
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &[u8]) -> std::io::Result<()> {
    writer.write_all(line).await?;
    writer.flush().await
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decide what happens to one inbound line
fn screen(line: &[u8]) -> Screened {
    if serde_json::from_slice::<ClientJsonRpcMessage>(line).is_ok() {
        return Screened::Forward;
    }

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse request: {}", e);
            return Screened::Reject(error_line(
                Value::Null,
                ErrorData::new(ErrorCode::PARSE_ERROR, format!("Parse error: {}", e), None),
            ));
        }
    };

    let id = value.get("id").cloned();
    let method = value.get("method").and_then(Value::as_str);
    match (id, method) {
        (None, Some(method)) => {
            debug!("Ignoring notification: {}", method);
            Screened::Drop
        }
        (Some(id), Some(method)) if HANDLED_METHODS.contains(&method) => {
            warn!("Malformed {} request", method);
            Screened::Reject(error_line(
                id,
                ErrorData::new(
                    ErrorCode::INVALID_PARAMS,
                    format!("Invalid params for {}", method),
                    None,
                ),
            ))
        }
        (Some(id), Some(method)) => Screened::Reject(error_line(
            id,
            ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
        )),
        (id, None) => Screened::Reject(error_line(
            id.unwrap_or(Value::Null),
            ErrorData::new(ErrorCode::INVALID_REQUEST, "Invalid request", None),
        )),
    }
}

fn error_line(id: Value, error: ErrorData) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
    .to_string()
}
