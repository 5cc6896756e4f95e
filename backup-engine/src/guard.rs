//! Business-software guard.
//!
//! Polls the OS process list for names on a configurable denylist. While any
//! of them runs, backups must not start and running jobs stop at the next
//! file boundary.

use std::sync::{Arc, Mutex, RwLock};
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Spreadsheet aliases that stay on the denylist whenever it is replaced.
pub const BUILTIN_ALIASES: &[&str] = &[
    "excel",
    "EXCEL",
    "Microsoft Excel",
    "com.microsoft.Excel",
    "Excel",
];

const STATE_CHANNEL_CAPACITY: usize = 16;

/// Answers "may a backup proceed right now?"
pub trait Guard: Send + Sync {
    /// True while a business application is running.
    fn is_running(&self) -> bool;

    /// Replace the process names this guard watches for.
    fn set_denylist(&self, _names: Vec<String>) {}
}

/// Source of running process names
pub trait ProcessLister: Send + Sync {
    fn process_names(&self) -> std::io::Result<Vec<String>>;
}

/// Process list backed by `sysinfo`
#[derive(Default)]
pub struct SystemProcesses {
    system: Mutex<System>,
}

impl ProcessLister for SystemProcesses {
    fn process_names(&self) -> std::io::Result<Vec<String>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| std::io::Error::other("process list lock poisoned"))?;
        system.refresh_processes(ProcessesToUpdate::All, true);
        Ok(system
            .processes()
            .values()
            .map(|p| p.name().to_string_lossy().into_owned())
            .collect())
    }
}

/// Denylist guard with edge-triggered state notifications
pub struct BusinessGuard {
    lister: Arc<dyn ProcessLister>,
    denylist: RwLock<Vec<String>>,
    last_state: Mutex<bool>,
    state_tx: broadcast::Sender<bool>,
}

impl BusinessGuard {
    /// Guard over the live OS process list
    pub fn new(denylist: Vec<String>) -> Self {
        Self::with_lister(denylist, Arc::new(SystemProcesses::default()))
    }

    pub fn with_lister(denylist: Vec<String>, lister: Arc<dyn ProcessLister>) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            lister,
            denylist: RwLock::new(denylist),
            last_state: Mutex::new(false),
            state_tx,
        }
    }

    /// Subscribe to running/not-running transitions
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.state_tx.subscribe()
    }

    pub fn denylist(&self) -> Vec<String> {
        self.denylist
            .read()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Replace the denylist. The built-in spreadsheet aliases are always kept.
    pub fn replace_denylist(&self, names: Vec<String>) {
        let mut list = names;
        for alias in BUILTIN_ALIASES {
            if !list.iter().any(|n| n.eq_ignore_ascii_case(alias)) {
                list.push((*alias).to_string());
            }
        }

        let mut guard = self
            .denylist
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = list;
    }

    fn detect(&self) -> std::io::Result<bool> {
        let denylist: Vec<String> = self
            .denylist()
            .into_iter()
            .map(|n| n.to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        if denylist.is_empty() {
            return Ok(false);
        }

        let names = self.lister.process_names()?;
        Ok(names.iter().any(|name| {
            let name = name.to_lowercase();
            denylist.iter().any(|deny| name.contains(deny.as_str()))
        }))
    }

    fn record_state(&self, running: bool) {
        let mut last = self
            .last_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last == running {
            return;
        }
        *last = running;
        drop(last);

        if running {
            info!("Business software detected, backups are suspended");
        } else {
            info!("No business software running, backups may resume");
        }
        // No subscribers is fine
        let _ = self.state_tx.send(running);
    }
}

impl Guard for BusinessGuard {
    fn is_running(&self) -> bool {
        match self.detect() {
            Ok(running) => {
                self.record_state(running);
                running
            }
            Err(e) => {
                warn!("Failed to enumerate processes, assuming no business software: {}", e);
                false
            }
        }
    }

    fn set_denylist(&self, names: Vec<String>) {
        self.replace_denylist(names);
    }
}
