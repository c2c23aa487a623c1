//! Stdio server: read loop, per-request tasks and a single writer task.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::discovery::DiscoveryEngine;
use crate::transport::codec::{read_line, write_message, Inbound};
use crate::transport::router::{error_response, RpcError, Router};
use crate::types::ServerConfig;

/// JSON-RPC server over a byte stream pair (stdin/stdout in production).
#[derive(Debug)]
pub struct StdioServer {
    router: Arc<Router>,
    config: ServerConfig,
    cancel: CancellationToken,
}

impl StdioServer {
    pub fn new(engine: Arc<DiscoveryEngine>, config: ServerConfig) -> Self {
        Self {
            router: Arc::new(Router::new(engine, config.clone())),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the read loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serve on the process's stdin and stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until EOF on `reader` or cancellation.
    ///
    /// Requests run concurrently; responses are written by one task in
    /// completion order. On EOF, in-flight requests finish before returning;
    /// on cancellation they are aborted.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let (tx, rx) = mpsc::channel::<Value>(self.config.write_channel_capacity.max(1));
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let mut inflight = JoinSet::new();
        let max_line_bytes = self.config.max_line_bytes;

        tracing::info!(max_line_bytes, "stdio server started");

        let read_result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("stdio server cancelled");
                    inflight.abort_all();
                    break Ok(());
                }
                line = read_line(&mut reader, max_line_bytes) => {
                    let inbound = match line {
                        Ok(Some(inbound)) => inbound,
                        Ok(None) => {
                            tracing::info!("client closed input");
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    };

                    match inbound {
                        Inbound::Oversized(skipped) => {
                            tracing::warn!(skipped, max_line_bytes, "oversized message dropped");
                            let err = RpcError::invalid_request(format!(
                                "message exceeds {} bytes",
                                max_line_bytes
                            ));
                            let _ = tx.send(error_response(Value::Null, &err)).await;
                        }
                        Inbound::Line(bytes) => {
                            if bytes.iter().all(u8::is_ascii_whitespace) {
                                continue;
                            }
                            match serde_json::from_slice::<Value>(&bytes) {
                                Ok(message) => {
                                    let router = self.router.clone();
                                    let tx = tx.clone();
                                    inflight.spawn(async move {
                                        if let Some(response) = router.handle(message).await {
                                            let _ = tx.send(response).await;
                                        }
                                    });
                                }
                                Err(e) => {
                                    tracing::debug!(error = %e, "unparseable message");
                                    let err = RpcError::parse_error(format!("parse error: {}", e));
                                    let _ = tx.send(error_response(Value::Null, &err)).await;
                                }
                            }
                        }
                    }

                    while inflight.try_join_next().is_some() {}
                }
            }
        };

        while let Some(joined) = inflight.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(error = %e, "request task panicked");
                }
            }
        }
        drop(tx);

        let write_result = writer_task
            .await
            .map_err(|e| std::io::Error::other(format!("writer task failed: {}", e)))?;
        read_result.and(write_result)
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Value>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        if let Err(e) = write_message(&mut writer, &message).await {
            tracing::warn!(error = %e, "write to client failed");
            return Err(e);
        }
    }
    Ok(())
}
