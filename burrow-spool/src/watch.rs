//! Stream of messages published to a spool's `new/` directory.

use std::{
    ffi::OsStr,
    ops::ControlFlow,
    path::{Path, PathBuf},
};

use ahash::AHashSet;
use burrow_common::{Signal, internal, spool};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{AccessKind, AccessMode, ModifyKind, RenameMode},
};
use tokio::{
    fs,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    error::{DeliveryError, Result},
    message::{Delivered, SpooledMessage},
    types::SpooledMessageId,
};

const BUFFER: usize = 64;

/// Messages arriving in a spool, in discovery order.
///
/// Everything already present when the stream is created is yielded first,
/// oldest id first, then each newly published message. Every id is yielded
/// at most once. The stream ends on shutdown; dropping it stops the watcher.
#[derive(Debug)]
pub struct Deliveries {
    receiver: mpsc::Receiver<Delivered>,
    task: JoinHandle<()>,
}

impl Deliveries {
    /// Next delivered message, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Delivered> {
        self.receiver.recv().await
    }
}

impl Drop for Deliveries {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching `dir`.
///
/// The watch is registered before the initial scan so nothing published in
/// between is missed; duplicates are filtered by id.
pub(crate) fn watch(dir: PathBuf, shutdown: broadcast::Receiver<Signal>) -> Result<Deliveries> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        // The receiving task has gone if this fails.
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let (sender, receiver) = mpsc::channel(BUFFER);
    let task = tokio::spawn(async move {
        // Held for the life of the task; dropping it ends the watch.
        let _watcher = watcher;
        run(dir, sender, event_rx, shutdown).await;
    });

    Ok(Deliveries { receiver, task })
}

async fn run(
    dir: PathBuf,
    sender: mpsc::Sender<Delivered>,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut shutdown: broadcast::Receiver<Signal>,
) {
    let mut seen = AHashSet::new();

    spool!("Watching {}", dir.display());
    if scan(&dir, &sender, &mut seen).await.is_break() {
        return;
    }

    loop {
        tokio::select! {
            signal = shutdown.recv() => match signal {
                Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                    internal!(
                        level = INFO,
                        "Received Shutdown signal, no longer watching {}",
                        dir.display()
                    );
                    return;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
            event = events.recv() => match event {
                Some(Ok(event)) if is_publication(&event.kind) => {
                    // Renames report both ends; only the name matters here.
                    for name in event.paths.iter().filter_map(|p| p.file_name()) {
                        if emit(&dir.join(name), &sender, &mut seen).await.is_break() {
                            return;
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    spool!(level = WARN, "Watch error on {}: {err}", dir.display());
                }
                None => return,
            },
        }
    }
}

/// Creates, renames into the directory, and closes after writing.
const fn is_publication(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

async fn scan(
    dir: &Path,
    sender: &mpsc::Sender<Delivered>,
    seen: &mut AHashSet<SpooledMessageId>,
) -> ControlFlow<()> {
    let mut paths = Vec::new();
    match fs::read_dir(dir).await {
        Ok(mut entries) => loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => paths.push(entry.path()),
                Ok(None) => break,
                Err(err) => {
                    spool!(level = WARN, "Error listing {}: {err}", dir.display());
                    break;
                }
            }
        },
        Err(err) => {
            spool!(level = WARN, "Unable to list {}: {err}", dir.display());
            return ControlFlow::Continue(());
        }
    }

    // ULID file names sort by creation time
    paths.sort();
    spool!(level = DEBUG, "Found {} entries in {}", paths.len(), dir.display());

    for path in &paths {
        emit(path, sender, seen).await?;
    }

    ControlFlow::Continue(())
}

/// Load and forward one message. Breaks only when the consumer has gone.
async fn emit(
    path: &Path,
    sender: &mpsc::Sender<Delivered>,
    seen: &mut AHashSet<SpooledMessageId>,
) -> ControlFlow<()> {
    let Some(name) = path.file_name().and_then(OsStr::to_str) else {
        return ControlFlow::Continue(());
    };
    if name.starts_with('.') {
        return ControlFlow::Continue(());
    }

    let Some(id) = SpooledMessageId::from_filename(name) else {
        spool!(level = WARN, "Ignoring unexpected spool entry {}", path.display());
        return ControlFlow::Continue(());
    };
    if seen.contains(&id) {
        return ControlFlow::Continue(());
    }

    match load(path).await {
        Ok(message) => {
            seen.insert(id.clone());
            spool!(level = DEBUG, "Loaded message {id} from {}", path.display());
            if sender.send(Delivered { id, message }).await.is_err() {
                return ControlFlow::Break(());
            }
        }
        Err(DeliveryError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            spool!(level = DEBUG, "{} disappeared before it was read", path.display());
        }
        Err(err) => {
            spool!(level = WARN, "Skipping {}: {err}", path.display());
        }
    }

    ControlFlow::Continue(())
}

pub(crate) async fn load(path: &Path) -> Result<SpooledMessage> {
    let bytes = fs::read(path).await?;
    Ok(SpooledMessage::parse(&bytes)?)
}
