//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::rpc_codes;
use crate::gateway::McpHandler;
use crate::protocol::JsonRpcResponse;
use crate::Result;

/// Serve MCP over the process's stdin and stdout until stdin closes
pub async fn serve_stdio(handler: McpHandler) -> Result<()> {
    info!("Serving MCP over stdio");
    let reader = BufReader::new(tokio::io::stdin());
    serve_lines(handler, reader, tokio::io::stdout()).await?;
    info!("stdin closed, shutting down");
    Ok(())
}

/// Serve newline-delimited JSON-RPC from `reader`, answering on `writer`.
///
/// Requests are handled concurrently; replies are written one per line in
/// completion order. Returns the writer once the reader is exhausted and
/// every in-flight request has been answered.
pub async fn serve_lines<R, W>(handler: McpHandler, reader: R, writer: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(64);

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "Failed to serialize response");
                    continue;
                }
            };
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(writer)
    });

    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        reap_finished(&mut in_flight);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Unparseable line");
                let response = JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Invalid JSON: {e}"),
                );
                if tx.send(response).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let handler = handler.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = handler.handle(message).await {
                let _ = tx.send(response).await;
            }
        });
    }

    while in_flight.join_next().await.is_some() {}
    drop(tx);

    let writer = writer_task
        .await
        .map_err(|e| crate::Error::Internal(format!("stdio writer task failed: {e}")))??;
    Ok(writer)
}

/// Drop finished request tasks so a long session does not accumulate them
fn reap_finished(in_flight: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = in_flight.try_join_next() {
        if let Err(e) = joined {
            error!(error = %e, "Request task failed");
        }
        reaped += 1;
    }
    reaped
}
