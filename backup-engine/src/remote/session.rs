//! One connected remote client.
//!
//! Replies and broadcast lines share the client's outbound queue, drained by
//! a dedicated writer task, so lines never interleave on the socket.

use super::commands::{dispatch, Command, HELP};
use super::Roster;
use crate::executor::BackupOrchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound lines queued per client before broadcasts start dropping
const CLIENT_QUEUE: usize = 256;

fn banner() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown host".to_string());
    format!(
        "Backup engine remote console on {} (v{})\n{}",
        host,
        env!("CARGO_PKG_VERSION"),
        HELP
    )
}

pub(super) async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    orchestrator: Arc<BackupOrchestrator>,
    roster: Roster,
    shutdown: CancellationToken,
) {
    let id = Uuid::new_v4();
    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE);

    let writer_task = tokio::spawn(async move {
        while let Some(mut message) = rx.recv().await {
            message.push('\n');
            if let Err(e) = writer.write_all(message.as_bytes()).await {
                debug!(client = %id, "Write failed: {}", e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    roster.add(id, tx.clone());
    info!(client = %id, %peer, "Remote client connected ({} connected)", roster.len());

    if tx.send(banner()).await.is_ok() {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = lines.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(client = %id, "Read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                debug!(client = %id, "Empty line, closing session");
                break;
            }

            let command = Command::parse(&line);
            debug!(client = %id, ?command, "Command received");
            let reply = dispatch(command, &orchestrator).await;
            if tx.send(reply).await.is_err() {
                break;
            }
        }
    }

    roster.remove(&id);
    drop(tx);
    let _ = writer_task.await;
    info!(client = %id, %peer, "Remote client disconnected");
}
