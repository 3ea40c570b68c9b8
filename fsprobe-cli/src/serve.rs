use std::rc::Rc;

use anyhow::anyhow;
use fsprobe_core::tools::r#trait::{ToolDefinition, ToolRequest};
use fsprobe_core::tools::registry::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One line of input from the orchestrator.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServeRequest {
    ListTools,
    CallTool {
        id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

/// One line of output to the orchestrator.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServeEvent {
    Tools {
        tools: Vec<ToolDefinition>,
    },
    ToolResult {
        id: String,
        is_error: bool,
        result: Value,
    },
    Error {
        message: String,
    },
}

/// Reads requests from `input` until EOF. Tool calls run concurrently as local
/// tasks; a single writer task owns `output` so lines never interleave.
/// Returns the output once every in-flight call has been written.
pub async fn run<R, W>(registry: ToolRegistry, input: R, output: W) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + 'static,
{
    let registry = Rc::new(registry);
    let (tx, mut rx) = mpsc::unbounded_channel::<ServeEvent>();

    let writer = tokio::task::spawn_local(async move {
        let mut output = output;
        while let Some(event) = rx.recv().await {
            let json = serde_json::to_string(&event)?;
            let json = format!("{json}\n");
            output.write_all(json.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<_, anyhow::Error>(output)
    });

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ServeRequest>(&line) {
            Ok(ServeRequest::ListTools) => {
                send(&tx, ServeEvent::Tools {
                    tools: registry.definitions(),
                })?;
            }
            Ok(ServeRequest::CallTool {
                id,
                name,
                arguments,
            }) => {
                debug!(%id, tool_name = %name, "Received tool call");
                let registry = registry.clone();
                let tx = tx.clone();
                tokio::task::spawn_local(async move {
                    let output = registry
                        .execute(&name, &ToolRequest::new(arguments, id.clone()))
                        .await;
                    let _ = tx.send(ServeEvent::ToolResult {
                        id,
                        is_error: output.is_error(),
                        result: output.to_json(),
                    });
                });
            }
            Err(e) => {
                warn!(error = %e, "Malformed request line");
                send(&tx, ServeEvent::Error {
                    message: format!("Invalid request: {e}"),
                })?;
            }
        }
    }

    // In-flight calls hold their own senders; the writer drains until they finish.
    drop(tx);
    writer.await?
}

/// Serves on the process's stdin and stdout.
pub async fn run_stdio(registry: ToolRegistry) -> anyhow::Result<()> {
    run(registry, BufReader::new(io::stdin()), io::stdout()).await?;
    Ok(())
}

fn send(tx: &mpsc::UnboundedSender<ServeEvent>, event: ServeEvent) -> anyhow::Result<()> {
    tx.send(event).map_err(|_| anyhow!("stdout writer stopped"))
}
