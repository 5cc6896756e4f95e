//! Remote control service.
//!
//! Line-oriented TCP console: every client gets a command session, and every
//! connected client receives the orchestrator's progress and completion
//! events as `Progress:<job>:<percent>` / `Complete:<job>:<success>:<error>`.
//! Plain text, no authentication.

mod commands;
mod session;

pub use commands::{Command, HELP};

use crate::executor::{forward_events, BackupOrchestrator};
use crate::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outbound queues of the connected clients
#[derive(Clone, Default)]
pub struct Roster {
    clients: Arc<Mutex<HashMap<Uuid, mpsc::Sender<String>>>>,
}

impl Roster {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, mpsc::Sender<String>>> {
        self.clients.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn add(&self, id: Uuid, tx: mpsc::Sender<String>) {
        self.lock().insert(id, tx);
    }

    fn remove(&self, id: &Uuid) {
        self.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Queue `line` for every client. Clients whose session is gone are
    /// dropped from the roster; the others are unaffected.
    fn broadcast(&self, line: &str) -> usize {
        let mut clients = self.lock();
        clients.retain(|id, tx| match tx.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(client = %id, "Client queue full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = %id, "Removing disconnected client");
                false
            }
        });
        clients.len()
    }
}

pub struct RemoteConsole {
    listener: TcpListener,
    orchestrator: Arc<BackupOrchestrator>,
    roster: Roster,
}

impl RemoteConsole {
    pub async fn bind(addr: impl ToSocketAddrs, orchestrator: Arc<BackupOrchestrator>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            orchestrator,
            roster: Roster::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle on the connected-client set
    pub fn clients(&self) -> Roster {
        self.roster.clone()
    }

    /// Accept clients and relay events until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!("Remote console listening on {}", addr);

        let roster = self.roster.clone();
        let relay = tokio::spawn(forward_events(
            self.orchestrator.subscribe(),
            shutdown.clone(),
            move |event| {
                let reached = roster.broadcast(&event.to_string());
                debug!("Relayed {} to {} client(s)", event, reached);
            },
        ));

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(session::serve_client(
                        stream,
                        peer,
                        Arc::clone(&self.orchestrator),
                        self.roster.clone(),
                        shutdown.child_token(),
                    ));
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            }
        }

        let _ = relay.await;
        info!("Remote console stopped");
        Ok(())
    }
}
