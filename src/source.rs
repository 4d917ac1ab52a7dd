use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub enum SourceEvent {
    /// The file's full content after a change.
    Text(String),
    Error(String),
}

/// Receiving end of a watched document file.
pub struct DocumentSource {
    rx: Receiver<SourceEvent>,
    queued: Arc<AtomicUsize>,
}

impl DocumentSource {
    pub fn try_recv(&self) -> Option<SourceEvent> {
        let event = self.rx.try_recv().ok()?;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    /// Whether a newer event is waiting, making any in-flight recompute stale.
    pub fn has_pending(&self) -> bool {
        self.queued.load(Ordering::Acquire) > 0
    }
}

pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Watch `path` and send its full text whenever it changes on disk.
pub fn watch_document(path: PathBuf, initial: String) -> DocumentSource {
    let (tx, rx) = mpsc::channel();
    let queued = Arc::new(AtomicUsize::new(0));
    let sender = QueuedSender {
        tx,
        queued: Arc::clone(&queued),
    };
    thread::spawn(move || {
        if let Err(e) = run_watcher(&path, initial, &sender) {
            warn!(target: "source", path = %path.display(), error = %e, "watcher stopped");
            sender.send(SourceEvent::Error(e.to_string()));
        }
    });
    DocumentSource { rx, queued }
}

struct QueuedSender {
    tx: Sender<SourceEvent>,
    queued: Arc<AtomicUsize>,
}

impl QueuedSender {
    fn send(&self, event: SourceEvent) -> bool {
        self.queued.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(event).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }
}

fn run_watcher(path: &Path, mut last: String, sender: &QueuedSender) -> Result<()> {
    let (notify_tx, notify_rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = notify_tx.send(res);
        },
        notify::Config::default().with_poll_interval(Duration::from_millis(100)),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;

    loop {
        match notify_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(_)) | Err(mpsc::RecvTimeoutError::Timeout) => {
                let text = match fs::read_to_string(path) {
                    Ok(text) => text,
                    // Editors often replace files by rename; try again next round.
                    Err(e) => {
                        debug!(target: "source", error = %e, "file not readable");
                        continue;
                    }
                };
                if text == last {
                    continue;
                }
                debug!(target: "source", bytes = text.len(), "file changed");
                last.clone_from(&text);
                if !sender.send(SourceEvent::Text(text)) {
                    return Ok(());
                }
            }
            Ok(Err(e)) => {
                if !sender.send(SourceEvent::Error(e.to_string())) {
                    return Ok(());
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}
